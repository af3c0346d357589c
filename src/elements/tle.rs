use super::types::ElementSet;

/// Split raw TLE text into (name, line1, line2) triples. Handles both
/// 2-line and 3-line records, skipping lines that belong to neither.
pub fn parse_tle_text(content: &str) -> Vec<(Option<String>, String, String)> {
    let lines: Vec<&str> = content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    let mut result = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].starts_with("1 ") && i + 1 < lines.len() && lines[i + 1].starts_with("2 ") {
            result.push((None, lines[i].to_string(), lines[i + 1].to_string()));
            i += 2;
        } else if i + 2 < lines.len()
            && lines[i + 1].starts_with("1 ")
            && lines[i + 2].starts_with("2 ")
        {
            result.push((
                Some(lines[i].to_string()),
                lines[i + 1].to_string(),
                lines[i + 2].to_string(),
            ));
            i += 3;
        } else {
            i += 1;
        }
    }

    result
}

/// Parse every element set in a TLE payload, skipping records the parser
/// rejects so one bad entry does not poison a whole collection.
pub fn element_sets_from_text(content: &str) -> Vec<ElementSet> {
    let mut sets = Vec::new();
    for (name, line1, line2) in parse_tle_text(content) {
        match ElementSet::from_tle(name, &line1, &line2) {
            Ok(set) => sets.push(set),
            Err(e) => log::warn!("Skipping unparseable element set: {}", e),
        }
    }
    sets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{GEO_LINE1, GEO_LINE2, LEO_LINE1, LEO_LINE2};

    #[test]
    fn parses_mixed_two_and_three_line_records() {
        let text = format!(
            "TESTSAT 1\n{LEO_LINE1}\n{LEO_LINE2}\n{GEO_LINE1}\n{GEO_LINE2}\n"
        );
        let triples = parse_tle_text(&text);
        assert_eq!(triples.len(), 2);
        assert_eq!(triples[0].0.as_deref(), Some("TESTSAT 1"));
        assert!(triples[1].0.is_none());
    }

    #[test]
    fn bad_record_does_not_poison_the_rest() {
        let text = format!("1 garbage\n2 garbage\nTESTSAT 1\n{LEO_LINE1}\n{LEO_LINE2}\n");
        let sets = element_sets_from_text(&text);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].norad_id, 25544);
    }
}
