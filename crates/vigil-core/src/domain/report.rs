//! Published report artifacts.

use serde::{Deserialize, Serialize};

use super::gate::GateKind;

/// One gate artifact that has been pushed to the report repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishedArtifact {
    pub commit: String,
    pub gate: GateKind,
    pub url: String,
}

/// Public URL of an artifact in a report repository served as static pages.
pub fn artifact_url(owner: &str, repo: &str, report_path: &str, file: &str) -> String {
    format!(
        "https://{}.github.io/{}/{}/{}",
        owner,
        repo,
        report_path.trim_matches('/'),
        file
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_url_shape() {
        let url = artifact_url("acme", "reports", "2026-10-17/abc1234-101500", "pytest.html");
        assert_eq!(
            url,
            "https://acme.github.io/reports/2026-10-17/abc1234-101500/pytest.html"
        );
    }

    #[test]
    fn test_artifact_url_trims_slashes() {
        let url = artifact_url("acme", "reports", "/a/b/", "black.html");
        assert_eq!(url, "https://acme.github.io/reports/a/b/black.html");
    }
}
