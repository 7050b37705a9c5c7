mod model;

pub use model::{User, UserPatch};
