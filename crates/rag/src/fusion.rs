//! Reciprocal Rank Fusion
//!
//! Each input list is ranked by descending similarity. A passage scores
//! `1 / (rank + k)` (0-based rank) in every list it appears in, summed
//! across lists. Passages are keyed by text, so duplicates collapse.
//! Ties keep first-seen order.

use std::collections::HashMap;

use rag_eval_core::ScoredPassage;

/// Fuse several result lists, best first
pub fn reciprocal_rank_fusion(lists: &[Vec<ScoredPassage>], k: f32) -> Vec<ScoredPassage> {
    let mut order: Vec<String> = Vec::new();
    let mut fused: HashMap<String, f32> = HashMap::new();

    for list in lists {
        for (rank, passage) in rank_list(list).into_iter().enumerate() {
            let contribution = 1.0 / (rank as f32 + k);
            match fused.get_mut(&passage.text) {
                Some(score) => *score += contribution,
                None => {
                    order.push(passage.text.clone());
                    fused.insert(passage.text, contribution);
                }
            }
        }
    }

    let mut results: Vec<ScoredPassage> = order
        .into_iter()
        .map(|text| {
            let score = fused.get(&text).copied().unwrap_or_default();
            ScoredPassage { text, score }
        })
        .collect();

    // sort_by is stable: equal scores keep first-seen order
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results
}

/// One list deduplicated by text (highest score wins) and sorted by score
fn rank_list(list: &[ScoredPassage]) -> Vec<ScoredPassage> {
    let mut deduped: Vec<ScoredPassage> = Vec::with_capacity(list.len());
    let mut index: HashMap<&str, usize> = HashMap::new();

    for passage in list {
        match index.get(passage.text.as_str()) {
            Some(&i) => {
                if passage.score > deduped[i].score {
                    deduped[i].score = passage.score;
                }
            }
            None => {
                index.insert(passage.text.as_str(), deduped.len());
                deduped.push(passage.clone());
            }
        }
    }

    deduped.sort_by(|a, b| b.score.total_cmp(&a.score));
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[(&str, f32)]) -> Vec<ScoredPassage> {
        items.iter().map(|(t, s)| ScoredPassage::new(*t, *s)).collect()
    }

    #[test]
    fn test_fused_score_is_sum_of_reciprocal_ranks() {
        let lists = vec![
            list(&[("a", 0.9), ("b", 0.8)]),
            list(&[("b", 0.7), ("c", 0.6)]),
        ];
        let fused = reciprocal_rank_fusion(&lists, 60.0);

        assert_eq!(fused[0].text, "b");
        assert!((fused[0].score - (1.0 / 61.0 + 1.0 / 60.0)).abs() < 1e-6);

        let a = fused.iter().find(|p| p.text == "a").unwrap();
        assert!((a.score - 1.0 / 60.0).abs() < 1e-6);
        assert_eq!(fused.len(), 3);
    }

    #[test]
    fn test_ranks_by_score_not_input_order() {
        let lists = vec![list(&[("low", 0.1), ("high", 0.9)])];
        let fused = reciprocal_rank_fusion(&lists, 60.0);
        assert_eq!(fused[0].text, "high");
        assert!((fused[0].score - 1.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_sorted_descending_and_absent_docs_never_appear() {
        let lists = vec![
            list(&[("x", 0.5), ("y", 0.4), ("z", 0.3)]),
            list(&[("z", 0.9)]),
            list(&[]),
        ];
        let fused = reciprocal_rank_fusion(&lists, 60.0);

        for pair in fused.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        let texts: Vec<&str> = fused.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["z", "x", "y"]);
    }

    #[test]
    fn test_duplicate_text_within_list_keeps_max() {
        let lists = vec![list(&[("a", 0.2), ("b", 0.5), ("a", 0.9)])];
        let fused = reciprocal_rank_fusion(&lists, 60.0);
        assert_eq!(fused[0].text, "a");
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let lists = vec![list(&[("first", 0.5)]), list(&[("second", 0.5)])];
        let fused = reciprocal_rank_fusion(&lists, 60.0);
        assert_eq!(fused[0].text, "first");
        assert_eq!(fused[1].text, "second");
    }

    #[test]
    fn test_empty_input() {
        assert!(reciprocal_rank_fusion(&[], 60.0).is_empty());
    }
}
