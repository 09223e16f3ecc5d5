// file: src/ova/descriptor.rs
// version: 1.1.0
// guid: ded56cec-3b09-4f74-bedd-6019a325de05

//! OVF descriptor file references
//!
//! Only the `<References>` section is interpreted; `<File>` elements inside
//! XML comments are ignored. Edits are applied to the original text in place
//! so the rest of the document keeps its exact bytes.

use crate::error::OvaDeployError;
use crate::Result;
use regex::Regex;
use std::ops::Range;
use std::path::Path;
use tokio::fs;

/// One `<File>` entry of the `<References>` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    pub id: String,
    pub href: String,
    pub size: Option<u64>,
}

/// An attribute parsed out of an element's start tag
#[derive(Debug)]
struct Attribute {
    prefix: Option<String>,
    name: String,
    value: String,
    /// Byte range of the value, relative to the element text
    value_range: Range<usize>,
}

/// OVF descriptor kept as text
#[derive(Debug, Clone)]
pub struct OvfDescriptor {
    content: String,
}

fn regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| OvaDeployError::descriptor(format!("Invalid regex pattern: {}", e)))
}

impl OvfDescriptor {
    /// Wrap descriptor text, rejecting documents without an `Envelope`
    pub fn parse(content: impl Into<String>) -> Result<Self> {
        let content = content.into();
        if !regex(r"<(?:[\w.-]+:)?Envelope\b")?.is_match(&content) {
            return Err(OvaDeployError::descriptor(
                "Document has no Envelope element",
            ));
        }
        Ok(Self { content })
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            OvaDeployError::descriptor(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(content)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, &self.content).await?;
        Ok(())
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Byte range of the `<References>` body
    fn references_range(&self) -> Result<Range<usize>> {
        let re = regex(
            r"(?s)<(?:[\w.-]+:)?References\b[^>]*>(.*?)</(?:[\w.-]+:)?References\s*>",
        )?;
        let caps = re.captures(&self.content).ok_or_else(|| {
            OvaDeployError::descriptor("Descriptor has no References section")
        })?;
        let body = caps
            .get(1)
            .ok_or_else(|| OvaDeployError::descriptor("Empty References section"))?;
        Ok(body.range())
    }

    /// Absolute byte ranges of every `<!-- ... -->` comment
    fn comment_ranges(&self) -> Result<Vec<Range<usize>>> {
        let re = regex(r"(?s)<!--.*?-->")?;
        Ok(re.find_iter(&self.content).map(|m| m.range()).collect())
    }

    /// Absolute byte ranges of every `<File>` start tag outside comments
    fn file_element_ranges(&self) -> Result<Vec<Range<usize>>> {
        let section = self.references_range()?;
        let comments = self.comment_ranges()?;
        let re = regex(r"<(?:[\w.-]+:)?File\b[^>]*>")?;
        Ok(re
            .find_iter(&self.content[section.clone()])
            .map(|m| (section.start + m.start())..(section.start + m.end()))
            .filter(|element| !comments.iter().any(|c| c.contains(&element.start)))
            .collect())
    }

    fn attributes(element: &str) -> Result<Vec<Attribute>> {
        let re = regex(r#"(?:([\w.-]+):)?([\w.-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?;
        Ok(re
            .captures_iter(element)
            .filter_map(|caps| {
                let value = caps.get(3).or_else(|| caps.get(4))?;
                Some(Attribute {
                    prefix: caps.get(1).map(|p| p.as_str().to_string()),
                    name: caps.get(2)?.as_str().to_string(),
                    value: value.as_str().to_string(),
                    value_range: value.range(),
                })
            })
            .collect())
    }

    fn reference_from(element: &str) -> Result<FileReference> {
        let attrs = Self::attributes(element)?;
        let find = |name: &str| attrs.iter().find(|a| a.name == name);

        let missing = |attr: &str| {
            OvaDeployError::descriptor(format!("File element without {}: {}", attr, element))
        };
        let href = find("href").ok_or_else(|| missing("href"))?.value.clone();
        let id = find("id").ok_or_else(|| missing("id"))?.value.clone();
        let size = match find("size") {
            Some(attr) => Some(attr.value.trim().parse::<u64>().map_err(|_| {
                OvaDeployError::descriptor(format!("Invalid size '{}' for {}", attr.value, href))
            })?),
            None => None,
        };

        Ok(FileReference { id, href, size })
    }

    /// Every file the descriptor references, in declaration order
    pub fn file_references(&self) -> Result<Vec<FileReference>> {
        self.file_element_ranges()?
            .into_iter()
            .map(|range| Self::reference_from(&self.content[range]))
            .collect()
    }

    /// The reference whose href names an ISO image
    pub fn iso_reference(&self) -> Result<FileReference> {
        let mut isos: Vec<FileReference> = self
            .file_references()?
            .into_iter()
            .filter(|r| r.href.to_ascii_lowercase().ends_with(".iso"))
            .collect();

        match isos.len() {
            0 => Err(OvaDeployError::descriptor(
                "Descriptor references no .iso file to carry the seed",
            )),
            1 => Ok(isos.remove(0)),
            _ => Err(OvaDeployError::descriptor(format!(
                "Descriptor references several .iso files: {}",
                isos.iter().map(|r| r.href.as_str()).collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    /// Set the `size` attribute of the `<File>` with the given id, adding the
    /// attribute when the element has none
    pub fn set_file_size(&mut self, id: &str, size: u64) -> Result<()> {
        for range in self.file_element_ranges()? {
            let element = self.content[range.clone()].to_string();
            let attrs = Self::attributes(&element)?;
            if !attrs.iter().any(|a| a.name == "id" && a.value == id) {
                continue;
            }

            if let Some(attr) = attrs.iter().find(|a| a.name == "size") {
                let start = range.start + attr.value_range.start;
                let end = range.start + attr.value_range.end;
                self.content.replace_range(start..end, &size.to_string());
            } else {
                let prefix = attrs
                    .iter()
                    .find(|a| a.name == "href")
                    .and_then(|a| a.prefix.clone())
                    .map(|p| format!("{}:", p))
                    .unwrap_or_default();
                let close = if element.ends_with("/>") { 2 } else { 1 };
                let insert_at = range.end - close;
                let insert_at = self.content[..insert_at].trim_end().len();
                self.content
                    .insert_str(insert_at, &format!(" {}size=\"{}\"", prefix, size));
            }
            return Ok(());
        }

        Err(OvaDeployError::descriptor(format!(
            "No File element with id '{}'",
            id
        )))
    }
}
