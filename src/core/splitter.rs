use crate::domain::model::Document;
use crate::utils::error::{ContractError, Result};
use std::collections::{HashMap, VecDeque};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// 遞迴字元切割器
///
/// 依序嘗試 `\n\n`、`\n`、空白與逐字元切割，小片段再貪婪合併回
/// 不超過 `chunk_size` 個字元的區塊，相鄰區塊保留至多 `chunk_overlap`
/// 個字元的重疊。長度以 Unicode 字元計算。
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ContractError::InvalidConfigValueError {
                field: "ingest.chunk_size".to_string(),
                value: chunk_size.to_string(),
                reason: "Chunk size must be at least 1".to_string(),
            });
        }
        if chunk_overlap >= chunk_size {
            return Err(ContractError::InvalidConfigValueError {
                field: "ingest.chunk_overlap".to_string(),
                value: chunk_overlap.to_string(),
                reason: format!("Overlap must be smaller than chunk size ({})", chunk_size),
            });
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// 切割後的片段繼承原文件 metadata，chunk_index 以來源為單位連續編號
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Document> {
        let mut next_index: HashMap<String, usize> = HashMap::new();
        let mut chunks = Vec::new();

        for document in documents {
            for piece in self.split_text(&document.content) {
                let index = next_index.entry(document.source().to_string()).or_insert(0);
                let mut metadata = document.metadata.clone();
                metadata.chunk_index = Some(*index);
                *index += 1;
                chunks.push(Document::new(piece, metadata));
            }
        }

        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];

        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let splits: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(start, c)| &text[start..start + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut final_chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for split in splits {
            if char_len(split) < self.chunk_size {
                pending.push(split);
                continue;
            }

            if !pending.is_empty() {
                final_chunks.extend(self.merge_splits(&pending, separator));
                pending.clear();
            }

            if remaining.is_empty() {
                final_chunks.push(split.to_string());
            } else {
                final_chunks.extend(self.split_recursive(split, remaining));
            }
        }

        if !pending.is_empty() {
            final_chunks.extend(self.merge_splits(&pending, separator));
        }

        final_chunks
    }

    fn merge_splits(&self, splits: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut merged = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &split in splits {
            let len = char_len(split);
            let joined_cost = |current: &VecDeque<&str>| {
                if current.is_empty() {
                    0
                } else {
                    separator_len
                }
            };

            if total + len + joined_cost(&current) > self.chunk_size && !current.is_empty() {
                if let Some(chunk) = join_trimmed(&current, separator) {
                    merged.push(chunk);
                }

                // 保留尾端作為下一區塊的重疊
                while total > self.chunk_overlap
                    || (total + len + joined_cost(&current) > self.chunk_size && total > 0)
                {
                    let Some(first) = current.front() else {
                        break;
                    };
                    let cost = char_len(first) + if current.len() > 1 { separator_len } else { 0 };
                    total = total.saturating_sub(cost);
                    current.pop_front();
                }
            }

            current.push_back(split);
            total += len + if current.len() > 1 { separator_len } else { 0 };
        }

        if let Some(chunk) = join_trimmed(&current, separator) {
            merged.push(chunk);
        }

        merged
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn join_trimmed(parts: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
