use serde::{Deserialize, Serialize};

use super::module::CutMode;

/// A request to a running analysis session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub command: Command,
    /// Cut threshold (for modules command)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cp: Option<f64>,
    /// Cut direction (for modules command)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<CutMode>,
    /// First class name (for coupling command)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a: Option<String>,
    /// Second class name (for coupling command)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b: Option<String>,
    /// Edge display threshold in percent of the heaviest pair
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_percent: Option<f64>,
    /// Number of merges to replay (for cluster command)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Facts,
    Weights,
    Coupling,
    Cluster,
    Dendrogram,
    Modules,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_request() {
        let req: SessionRequest = serde_json::from_str(r#"{"command":"cluster"}"#).unwrap();
        assert_eq!(req.command, Command::Cluster);
        assert!(req.cp.is_none());
    }

    #[test]
    fn parses_modules_request() {
        let req: SessionRequest =
            serde_json::from_str(r#"{"command":"modules","cp":0.1,"mode":"distance"}"#).unwrap();
        assert_eq!(req.command, Command::Modules);
        assert_eq!(req.cp, Some(0.1));
        assert_eq!(req.mode, Some(CutMode::Distance));
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(serde_json::from_str::<SessionRequest>(r#"{"command":"ast"}"#).is_err());
    }
}
