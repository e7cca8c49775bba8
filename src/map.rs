//! XML export of the mapped hierarchy.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::core::errors::{BidsError, Result};
use crate::tree::Tree;

impl Tree {
    /// Render the whole hierarchy as an indented XML document. Subject
    /// attributes mirror the participants row; absent values are omitted.
    pub fn generate_map(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "<BIDSTree path=\"{}\">",
            escape(&self.root.to_string_lossy())
        );
        for project in self.projects() {
            let _ = writeln!(out, "    <Project ID=\"{}\">", escape(project.id()));
            for subject in project.subjects() {
                let mut attributes = String::new();
                for (column, value) in subject.data_pairs() {
                    if let Some(value) = value {
                        let _ = write!(attributes, " {}=\"{}\"", escape(column), escape(value));
                    }
                }
                let _ = writeln!(
                    out,
                    "        <Subject ID=\"{}\"{attributes}>",
                    escape(subject.id())
                );
                for session in subject.sessions() {
                    let _ = writeln!(
                        out,
                        "            <Session ID=\"{}\">",
                        escape(session.id())
                    );
                    for scan in session.scans() {
                        let _ = writeln!(
                            out,
                            "                <Scan path=\"{}\"/>",
                            escape(scan.raw_file())
                        );
                    }
                    let _ = writeln!(out, "            </Session>");
                }
                let _ = writeln!(out, "        </Subject>");
            }
            let _ = writeln!(out, "    </Project>");
        }
        out.push_str("</BIDSTree>\n");
        out
    }

    /// Write [`Tree::generate_map`] output to `path`.
    pub fn write_map(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.generate_map()).map_err(|e| BidsError::io(path, e))
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
