//! Batching and in-batch deduplication

use std::collections::HashSet;

use crate::hashing::HashedDocument;

/// Fixed-size chunks over any iterator
///
/// Yields `Vec`s of at most `size` items; the final chunk may be short,
/// and no empty chunk is ever yielded.
pub struct Batches<I: Iterator> {
    inner: I,
    size: usize,
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut chunk = Vec::with_capacity(self.size);
        for item in self.inner.by_ref() {
            chunk.push(item);
            if chunk.len() == self.size {
                break;
            }
        }
        if chunk.is_empty() {
            None
        } else {
            Some(chunk)
        }
    }
}

/// Consume an iterator in fixed-size batches
pub fn batches<I: IntoIterator>(size: usize, iter: I) -> Batches<I::IntoIter> {
    assert!(size > 0, "batch size must be positive");
    Batches {
        inner: iter.into_iter(),
        size,
    }
}

/// Drop later occurrences of an already-seen identity hash
///
/// Lazy, order-preserving, first occurrence wins. Guarantees at most
/// one write per identity per batch, so a store enforcing key
/// uniqueness never sees a conflicting double-insert from one batch.
pub fn deduplicate_in_order(
    docs: impl IntoIterator<Item = HashedDocument>,
) -> impl Iterator<Item = HashedDocument> {
    let mut seen: HashSet<String> = HashSet::new();
    docs.into_iter().filter(move |doc| seen.insert(doc.hash.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn hashed(content: &str, source: &str) -> HashedDocument {
        HashedDocument::from_document(Document::with_source(content, source), None)
    }

    #[test]
    fn test_batches_exact_multiple() {
        let chunks: Vec<Vec<i32>> = batches(2, vec![1, 2, 3, 4]).collect();
        assert_eq!(chunks, vec![vec![1, 2], vec![3, 4]]);
    }

    #[test]
    fn test_batches_trailing_short_chunk() {
        let chunks: Vec<Vec<i32>> = batches(3, vec![1, 2, 3, 4]).collect();
        assert_eq!(chunks, vec![vec![1, 2, 3], vec![4]]);
    }

    #[test]
    fn test_batches_empty_input_yields_nothing() {
        let chunks: Vec<Vec<i32>> = batches(3, Vec::<i32>::new()).collect();
        assert!(chunks.is_empty());
    }

    #[test]
    #[should_panic(expected = "batch size must be positive")]
    fn test_batches_zero_size_panics() {
        let _ = batches(0, vec![1]);
    }

    #[test]
    fn test_dedup_collapses_identical_items() {
        let docs = vec![
            hashed("data 1", "a.txt"),
            hashed("data 1", "a.txt"),
            hashed("data 2", "a.txt"),
        ];

        let deduped: Vec<_> = deduplicate_in_order(docs).collect();
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].document().page_content, "data 1");
        assert_eq!(deduped[1].document().page_content, "data 2");
    }

    #[test]
    fn test_dedup_keeps_first_occurrence_position() {
        let docs = vec![
            hashed("a", "s"),
            hashed("b", "s"),
            hashed("a", "s"),
            hashed("c", "s"),
        ];

        let contents: Vec<String> = deduplicate_in_order(docs)
            .map(|d| d.document().page_content.clone())
            .collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_dedup_keys_on_identity_hash_not_uid() {
        let doc = Document::with_source("data", "a.txt");
        let first = HashedDocument::from_document(doc.clone(), Some("uid-1".to_string()));
        let second = HashedDocument::from_document(doc, Some("uid-2".to_string()));

        // Same payload under different explicit uids is still one item.
        let deduped: Vec<_> = deduplicate_in_order(vec![first, second]).collect();
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].uid, "uid-1");
    }

    #[test]
    fn test_dedup_distinguishes_sources() {
        let docs = vec![hashed("data", "a.txt"), hashed("data", "b.txt")];
        let deduped: Vec<_> = deduplicate_in_order(docs).collect();
        assert_eq!(deduped.len(), 2);
    }
}
