pub mod http;

use url::Url;

/// Dashboard hand-off link for a user, `<base>?userId=<id>`.
pub fn dashboard_url(base: &Url, user_id: &str) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut().append_pair("userId", user_id);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_url() {
        let base = Url::parse("https://yourapp.com/dashboard").unwrap();
        assert_eq!(
            dashboard_url(&base, "12345").as_str(),
            "https://yourapp.com/dashboard?userId=12345"
        );
    }

    #[test]
    fn test_dashboard_url_keeps_existing_query() {
        let base = Url::parse("https://yourapp.com/dashboard?source=bot").unwrap();
        assert_eq!(
            dashboard_url(&base, "12345").as_str(),
            "https://yourapp.com/dashboard?source=bot&userId=12345"
        );
    }
}
