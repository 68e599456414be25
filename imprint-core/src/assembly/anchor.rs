use super::similarity::{basename, fold_diacritics, longest_common_substring, token_set_ratio};
use tracing::debug;

/// Normalized form used to compare organization mentions
pub fn normalize_organization(text: &str) -> String {
    fold_diacritics(text.trim())
}

/// Most frequent pairwise common substring, first seen on frequency ties
fn most_frequent_common_substring(normalized: &[String]) -> Option<String> {
    let mut tally: Vec<(String, usize)> = Vec::new();
    for (position, first) in normalized.iter().enumerate() {
        for second in &normalized[position + 1..] {
            let common = longest_common_substring(first, second);
            let common = common.trim();
            if common.is_empty() {
                continue;
            }
            match tally.iter_mut().find(|(seen, _)| seen == common) {
                Some((_, count)) => *count += 1,
                None => tally.push((common.to_string(), 1)),
            }
        }
    }

    let mut best: Option<(String, usize)> = None;
    for (substring, count) in tally {
        if best.as_ref().map_or(true, |(_, best_count)| count > *best_count) {
            best = Some((substring, count));
        }
    }
    best.map(|(substring, _)| substring)
}

/// Pick the organization name the imprint is about.
///
/// Candidates are the first organization mention, the most frequent common
/// substring of all mention pairs, the crawled domain labels and every
/// normalized mention. Pairs are scored on their basenames; the candidates
/// taking part in the best-scoring pair are finalists and the longest
/// finalist wins, then the earliest.
/// Returns `None` without organization mentions.
pub fn select_anchor(
    organizations: &[&str],
    domain_labels: &[String],
    legal_forms: &[String],
) -> Option<String> {
    let normalized: Vec<String> = organizations
        .iter()
        .map(|organization| normalize_organization(organization))
        .collect();
    let first = normalized.first()?.clone();

    let mut candidates: Vec<String> = Vec::new();
    let proposals = std::iter::once(first)
        .chain(most_frequent_common_substring(&normalized))
        .chain(domain_labels.iter().cloned())
        .chain(normalized.iter().cloned());
    for proposal in proposals {
        let proposal = proposal.trim().to_string();
        if !proposal.is_empty() && !candidates.contains(&proposal) {
            candidates.push(proposal);
        }
    }

    if candidates.len() <= 1 {
        return candidates.pop();
    }

    let basenames: Vec<String> = candidates
        .iter()
        .map(|candidate| basename(candidate, legal_forms))
        .collect();

    let mut best_score = 0;
    let mut finalists: Vec<usize> = Vec::new();
    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            let score = token_set_ratio(&basenames[i], &basenames[j]);
            if score > best_score {
                best_score = score;
                finalists.clear();
            }
            if score == best_score {
                finalists.extend([i, j]);
            }
        }
    }
    finalists.sort_unstable();
    finalists.dedup();

    let mut anchor: Option<&String> = None;
    for index in finalists {
        let candidate = &candidates[index];
        if anchor.map_or(true, |current| candidate.chars().count() > current.chars().count()) {
            anchor = Some(candidate);
        }
    }

    debug!(
        candidates = candidates.len(),
        score = best_score,
        anchor = ?anchor,
        "selected anchor organization"
    );
    anchor.cloned()
}
