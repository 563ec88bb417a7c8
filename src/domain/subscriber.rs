/// Key prefix every subscriber lives under in the external store.
pub const SUBSCRIBER_PREFIX: &str = "/CMRestAPI/RecvAddrList/";

/// Who wants to be told about a new primary: one entry per client IP and app.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberKey {
    pub client_ip: String,
    pub app: Option<String>,
}

impl SubscriberKey {
    /// An empty app name means the default subscriber of the IP.
    pub fn new(client_ip: impl Into<String>, app: Option<&str>) -> Self {
        Self {
            client_ip: client_ip.into(),
            app: app.filter(|a| !a.is_empty()).map(str::to_string),
        }
    }

    /// `client_ip[/app]`, the part of the key after the prefix.
    pub fn suffix(&self) -> String {
        match &self.app {
            Some(app) => format!("{}/{}", self.client_ip, app),
            None => self.client_ip.clone(),
        }
    }

    pub fn store_key(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_with_and_without_app() {
        let plain = SubscriberKey::new("10.0.0.1", None);
        assert_eq!(plain.store_key(SUBSCRIBER_PREFIX), "/CMRestAPI/RecvAddrList/10.0.0.1");

        let empty = SubscriberKey::new("10.0.0.1", Some(""));
        assert_eq!(empty, plain);

        let app = SubscriberKey::new("10.0.0.1", Some("billing"));
        assert_eq!(app.suffix(), "10.0.0.1/billing");
        assert_eq!(
            app.store_key(SUBSCRIBER_PREFIX),
            "/CMRestAPI/RecvAddrList/10.0.0.1/billing"
        );
    }
}
