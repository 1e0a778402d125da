pub mod framer;

pub use framer::Framer;

/// One complete message between the `/` identification line and the `!` end line
#[derive(Debug, Clone, PartialEq)]
pub struct Telegram {
    pub raw: String,
    /// Unix timestamp (seconds) the telegram was captured at
    pub captured_at: i64,
}

impl Telegram {
    pub fn new(raw: String, captured_at: i64) -> Self {
        Telegram { raw, captured_at }
    }

    /// Identification line without the leading `/`
    pub fn identification(&self) -> &str {
        self.raw
            .lines()
            .next()
            .and_then(|line| line.strip_prefix('/'))
            .map(|id| id.trim_end())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identification() {
        let telegram = Telegram::new("/ISk5\\2ME382-1003\r\n1-0:1.7.0(0000.98*kW)\r\n!\r\n".to_string(), 0);
        assert_eq!(telegram.identification(), "ISk5\\2ME382-1003");
    }

    #[test]
    fn test_identification_missing() {
        let telegram = Telegram::new("".to_string(), 0);
        assert_eq!(telegram.identification(), "");
    }
}
