use anyhow::{Context, Result};

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Parse a comma-separated list of indices. `all` (or an empty list) expands
/// to `available`; ranges such as `11-15` expand inclusively.
pub fn parse_index_list(s: &str, available: &[u32]) -> Result<Vec<u32>> {
    let tokens = split_csv(s);
    if tokens.is_empty() || tokens.iter().any(|t| t.eq_ignore_ascii_case("all")) {
        return Ok(available.to_vec());
    }

    let mut values = Vec::new();
    for token in tokens {
        if let Some((start, end)) = token.split_once('-') {
            let start: u32 = start
                .trim()
                .parse()
                .with_context(|| format!("invalid range start in '{token}'"))?;
            let end: u32 = end
                .trim()
                .parse()
                .with_context(|| format!("invalid range end in '{token}'"))?;
            values.extend(start..=end);
        } else {
            values.push(
                token
                    .parse()
                    .with_context(|| format!("invalid index '{token}'"))?,
            );
        }
    }
    values.sort_unstable();
    values.dedup();
    Ok(values)
}
