//! Concatenation of file records with source-map stitching.
//!
//! Records are joined with a single `\n`. When maps are requested, each
//! record carrying a path and a non-empty map has its mappings shifted down
//! by the number of lines emitted before it and re-indexed into the merged
//! `sources`/`names` tables. Everything else contributes bytes only.
//!
//! The produced bytes never depend on whether maps are requested.

use tracing::warn;

use crate::sourcemap::{decode_mappings, encode_mappings, OriginalPosition, Segment, SourceMap};
use crate::FileRecord;

const SEPARATOR: u8 = b'\n';

#[derive(Debug)]
pub struct Concatenator {
    file: String,
    with_maps: bool,
    contents: Vec<u8>,
    entries: usize,
    /// Newlines in `contents` so far. Only tracked when maps are requested.
    line_count: usize,
    sources: Vec<String>,
    sources_content: Vec<Option<String>>,
    names: Vec<String>,
    lines: Vec<Vec<Segment>>,
}

impl Concatenator {
    pub fn new(file: impl Into<String>, with_maps: bool) -> Self {
        Self {
            file: file.into(),
            with_maps,
            contents: Vec::new(),
            entries: 0,
            line_count: 0,
            sources: Vec::new(),
            sources_content: Vec::new(),
            names: Vec::new(),
            lines: Vec::new(),
        }
    }

    /// Append one file record.
    pub fn add(&mut self, record: &FileRecord) {
        let line_offset = self.push_bytes(&record.contents);
        if !self.with_maps {
            return;
        }
        if let (Some(path), Some(map)) = (&record.path, &record.source_map) {
            if !map.is_empty() {
                self.merge_map(map, Some(path.as_str()), line_offset);
            }
        }
    }

    /// Append an already-assembled section, keeping the sources of its map.
    pub fn add_raw(&mut self, contents: &[u8], map: Option<&SourceMap>) {
        let line_offset = self.push_bytes(contents);
        if !self.with_maps {
            return;
        }
        if let Some(map) = map.filter(|m| !m.is_empty()) {
            self.merge_map(map, None, line_offset);
        }
    }

    /// Returns the line the appended bytes start on.
    fn push_bytes(&mut self, bytes: &[u8]) -> usize {
        if self.entries > 0 {
            self.contents.push(SEPARATOR);
            if self.with_maps {
                self.line_count += 1;
            }
        }
        self.entries += 1;

        let start_line = self.line_count;
        self.contents.extend_from_slice(bytes);
        if self.with_maps {
            self.line_count += bytes.iter().filter(|&&b| b == SEPARATOR).count();
        }
        start_line
    }

    fn merge_map(&mut self, map: &SourceMap, attribute_to: Option<&str>, line_offset: usize) {
        let decoded = match decode_mappings(&map.mappings) {
            Ok(lines) => lines,
            Err(err) => {
                warn!(
                    path = attribute_to.unwrap_or("<section>"),
                    error = %err,
                    "discarding malformed source map"
                );
                return;
            }
        };

        let out_of_range = decoded.iter().flatten().filter_map(|s| s.original).any(|o| {
            o.source as usize >= map.sources.len()
                || o.name.is_some_and(|n| n as usize >= map.names.len())
        });
        if out_of_range {
            warn!(
                path = attribute_to.unwrap_or("<section>"),
                "discarding source map with out-of-range indices"
            );
            return;
        }

        // A single-source map is attributed to the record's own path.
        let source_ids: Vec<u32> = match attribute_to {
            Some(path) if map.sources.len() == 1 => {
                let content = map.sources_content.first().cloned().flatten();
                vec![self.intern_source(path.to_string(), content)]
            }
            _ => map
                .sources
                .iter()
                .enumerate()
                .map(|(i, source)| {
                    let name = match &map.source_root {
                        Some(root) if !root.is_empty() => {
                            format!("{}/{}", root.trim_end_matches('/'), source)
                        }
                        _ => source.clone(),
                    };
                    let content = map.sources_content.get(i).cloned().flatten();
                    self.intern_source(name, content)
                })
                .collect(),
        };
        let name_ids: Vec<u32> = map.names.iter().map(|n| self.intern_name(n)).collect();

        for (index, segments) in decoded.into_iter().enumerate() {
            if segments.is_empty() {
                continue;
            }
            let target = line_offset + index;
            if self.lines.len() <= target {
                self.lines.resize_with(target + 1, Vec::new);
            }
            self.lines[target].extend(segments.into_iter().map(|segment| Segment {
                generated_column: segment.generated_column,
                original: segment.original.map(|o| OriginalPosition {
                    source: source_ids[o.source as usize],
                    name: o.name.map(|n| name_ids[n as usize]),
                    ..o
                }),
            }));
        }
    }

    fn intern_source(&mut self, name: String, content: Option<String>) -> u32 {
        if let Some(index) = self.sources.iter().position(|s| *s == name) {
            if self.sources_content[index].is_none() {
                self.sources_content[index] = content;
            }
            return index as u32;
        }
        self.sources.push(name);
        self.sources_content.push(content);
        (self.sources.len() - 1) as u32
    }

    fn intern_name(&mut self, name: &str) -> u32 {
        if let Some(index) = self.names.iter().position(|n| n == name) {
            return index as u32;
        }
        self.names.push(name.to_string());
        (self.names.len() - 1) as u32
    }

    /// Consume the concatenator. The map is `None` when maps were not requested.
    pub fn finish(self) -> (Vec<u8>, Option<SourceMap>) {
        if !self.with_maps {
            return (self.contents, None);
        }

        let sources_content = if self.sources_content.iter().all(Option::is_none) {
            Vec::new()
        } else {
            self.sources_content
        };
        let map = SourceMap {
            version: 3,
            file: Some(self.file),
            source_root: None,
            sources: self.sources,
            sources_content,
            names: self.names,
            mappings: encode_mappings(&self.lines),
        };
        (self.contents, Some(map))
    }
}

/// Concatenate `records` in order into one blob named `file`.
pub fn concat(records: &[FileRecord], file: &str, with_maps: bool) -> (Vec<u8>, Option<SourceMap>) {
    let mut concatenator = Concatenator::new(file, with_maps);
    for record in records {
        concatenator.add(record);
    }
    concatenator.finish()
}
