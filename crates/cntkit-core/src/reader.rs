use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StreamFormat {
    #[default]
    Dense,
    Sparse,
}

impl StreamFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamFormat::Dense => "dense",
            StreamFormat::Sparse => "sparse",
        }
    }
}

/// Binds an input node of the model to one stream of the data file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamMapping {
    pub node: String,
    /// Stream name as it appears in the data file (`|alias v0 v1 ...`).
    pub alias: String,
    pub dim: usize,
    pub format: StreamFormat,
}

/// Parses `node:alias:dim` with an optional trailing `:sparse`.
impl FromStr for StreamMapping {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split(':').collect();
        let (node, alias, dim, format) = match parts.as_slice() {
            [node, alias, dim] => (node, alias, dim, StreamFormat::Dense),
            [node, alias, dim, "dense"] => (node, alias, dim, StreamFormat::Dense),
            [node, alias, dim, "sparse"] => (node, alias, dim, StreamFormat::Sparse),
            _ => anyhow::bail!("invalid stream mapping: {raw} (expected node:alias:dim[:sparse])"),
        };
        Ok(StreamMapping {
            node: node.to_string(),
            alias: alias.to_string(),
            dim: dim
                .parse()
                .with_context(|| format!("invalid stream dimension in {raw}"))?,
            format,
        })
    }
}

/// Describes how the toolkit's text-format reader feeds data to input nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputMap {
    pub file: Option<PathBuf>,
    pub streams: Vec<StreamMapping>,
    pub randomize: bool,
}

impl InputMap {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(file.into()),
            ..Self::default()
        }
    }

    pub fn with_stream(
        mut self,
        node: impl Into<String>,
        alias: impl Into<String>,
        dim: usize,
        format: StreamFormat,
    ) -> Self {
        self.streams.push(StreamMapping {
            node: node.into(),
            alias: alias.into(),
            dim,
            format,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.file.is_none() && self.streams.is_empty()
    }

    /// Whether some stream feeds input node `node`.
    pub fn feeds(&self, node: &str) -> bool {
        self.streams.iter().any(|s| s.node == node)
    }

    /// Renders the `reader = [...]` block. An empty map renders nothing.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut lines = vec![
            "reader = [".to_string(),
            "    readerType = \"CNTKTextFormatReader\"".to_string(),
        ];
        if let Some(file) = &self.file {
            lines.push(format!("    file = \"{}\"", file.display()));
        }
        let randomize = if self.randomize { "auto" } else { "none" };
        lines.push(format!("    randomize = \"{randomize}\""));
        lines.push("    input = [".to_string());
        for stream in &self.streams {
            lines.extend([
                format!("        {} = [", stream.node),
                format!("            alias = \"{}\"", stream.alias),
                format!("            dim = {}", stream.dim),
                format!("            format = \"{}\"", stream.format.as_str()),
                "        ]".to_string(),
            ]);
        }
        lines.push("    ]".to_string());
        lines.push("]".to_string());
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_reader_block() {
        let map = InputMap::new("/data/train.txt")
            .with_stream("features", "x", 2, StreamFormat::Dense)
            .with_stream("labels", "y", 10, StreamFormat::Sparse);
        let text = map.render();
        assert!(text.starts_with("reader = ["));
        assert!(text.contains("readerType = \"CNTKTextFormatReader\""));
        assert!(text.contains("file = \"/data/train.txt\""));
        assert!(text.contains("randomize = \"none\""));
        assert!(text.contains("features = ["));
        assert!(text.contains("alias = \"y\""));
        assert!(text.contains("format = \"sparse\""));
        assert!(text.ends_with("        ]\n    ]\n]"));
        assert!(map.feeds("labels"));
        assert!(!map.feeds("y"));
    }

    #[test]
    fn empty_map_renders_nothing() {
        assert_eq!(InputMap::default().render(), "");
    }

    #[test]
    fn parses_stream_mapping() {
        let m: StreamMapping = "labels:y:10:sparse".parse().unwrap();
        assert_eq!(m.node, "labels");
        assert_eq!(m.alias, "y");
        assert_eq!(m.dim, 10);
        assert_eq!(m.format, StreamFormat::Sparse);

        let m: StreamMapping = "x:x:3".parse().unwrap();
        assert_eq!(m.format, StreamFormat::Dense);

        assert!("x:x".parse::<StreamMapping>().is_err());
        assert!("x:x:three".parse::<StreamMapping>().is_err());
    }
}
