use serde::{Deserialize, Serialize};

/// Image scanning settings of a repository
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageScanningConfiguration {
    /// Scan every image after it is pushed. When off, scans must be started
    /// manually.
    #[serde(default)]
    pub scan_on_push: bool,
}

impl ImageScanningConfiguration {
    pub fn new(scan_on_push: bool) -> Self {
        Self { scan_on_push }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_string(&ImageScanningConfiguration::new(true)).unwrap();
        assert_eq!(json, r#"{"scanOnPush":true}"#);

        let parsed: ImageScanningConfiguration = serde_json::from_str("{}").unwrap();
        assert!(!parsed.scan_on_push);
    }
}
