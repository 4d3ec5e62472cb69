//! The graph-layout seam: DOT source in, rendered markup out.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

/// Black-box layout engine. The session never inspects graph source or
/// markup; it only moves text across this boundary.
#[async_trait]
pub trait LayoutEngine: Send + Sync {
    async fn render(&self, source_text: &str) -> Result<String, String>;
}

/// Lays graphs out through a local Graphviz `dot` subprocess.
pub struct DotProcessLayout {
    program: String,
}

impl DotProcessLayout {
    pub fn new() -> Self {
        Self::with_program("dot")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for DotProcessLayout {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LayoutEngine for DotProcessLayout {
    async fn render(&self, source_text: &str) -> Result<String, String> {
        let mut child = tokio::process::Command::new(&self.program)
            .arg("-Tsvg")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| format!("spawn {}: {e}", self.program))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| format!("{}: stdin unavailable", self.program))?;
        stdin
            .write_all(source_text.as_bytes())
            .await
            .map_err(|e| format!("write graph source to {}: {e}", self.program))?;
        drop(stdin); // EOF so dot starts rendering

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| format!("wait for {}: {e}", self.program))?;
        if !output.status.success() {
            return Err(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        String::from_utf8(output.stdout).map_err(|e| format!("rendered markup is not UTF-8: {e}"))
    }
}
