use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, warn};

use crate::models::{SymbolAssignment, SymbolSource, Transaction};

pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

const STRIPPED: &[char] = &['&', '.', ',', '-', '(', ')', '[', ']', '%'];

/// Acronym of a security description: first letter of each word, at most `max_len` long.
///
/// `ISHARES EDGE MSCI WORLD VALUE FACTOR` gives `IEMWVF`. Pure and deterministic;
/// an empty or punctuation-only description gives `UNKNOWN`.
pub fn generate_symbol(description: &str, max_len: usize) -> String {
    let cleaned: String = description
        .to_uppercase()
        .chars()
        .map(|c| if STRIPPED.contains(&c) { ' ' } else { c })
        .collect();
    let acronym: String = cleaned
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(max_len)
        .collect();
    if acronym.is_empty() {
        UNKNOWN_SYMBOL.to_string()
    } else {
        acronym
    }
}

/// Key used to recognise the same security across rows.
pub fn normalize_description(description: &str) -> String {
    description.trim().to_lowercase()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolStats {
    pub missing_symbols: usize,
    pub mapped: usize,
    pub reused: usize,
    pub generated: usize,
    pub fallback: usize,
    /// Missing-symbol rows per description (`(no description)` when blank).
    pub missing_descriptions: BTreeMap<String, usize>,
    /// Description -> (assigned symbol, rows assigned).
    pub assignments: BTreeMap<String, (String, usize)>,
}

pub struct SymbolReport {
    pub rows: Vec<Transaction>,
    pub assignments: Vec<SymbolAssignment>,
    pub stats: SymbolStats,
}

/// Fills in missing symbols for one file. State lives for a single run.
pub struct SymbolResolver<'a> {
    mapping: &'a HashMap<String, String>,
    security_actions: &'a [String],
    max_symbol_length: usize,
    by_description: HashMap<String, String>,
    acronym_counts: HashMap<String, usize>,
    generated: HashSet<String>,
    assignments: Vec<SymbolAssignment>,
    stats: SymbolStats,
}

impl<'a> SymbolResolver<'a> {
    pub fn new(
        mapping: &'a HashMap<String, String>,
        security_actions: &'a [String],
        max_symbol_length: usize,
    ) -> Self {
        Self {
            mapping,
            security_actions,
            max_symbol_length,
            by_description: HashMap::new(),
            acronym_counts: HashMap::new(),
            generated: HashSet::new(),
            assignments: Vec::new(),
            stats: SymbolStats::default(),
        }
    }

    /// Resolve every row in file order. Row numbers count the header as line 1.
    pub fn resolve_all(mut self, rows: Vec<Transaction>) -> SymbolReport {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(idx, row)| self.resolve(idx + 2, row))
            .collect();
        SymbolReport {
            rows,
            assignments: self.assignments,
            stats: self.stats,
        }
    }

    pub fn resolve(&mut self, row_num: usize, row: Transaction) -> Transaction {
        if !row.has_missing_symbol() || !row.is_security_transaction(self.security_actions) {
            return row;
        }

        let description = row.description.trim().to_string();
        self.stats.missing_symbols += 1;
        let desc_key = if description.is_empty() {
            "(no description)".to_string()
        } else {
            description.clone()
        };
        *self.stats.missing_descriptions.entry(desc_key).or_default() += 1;

        let (symbol, source) = if description.is_empty() {
            let symbol = format!("{UNKNOWN_SYMBOL}{row_num}");
            warn!("row {row_num} has no description, using {symbol}");
            self.stats.fallback += 1;
            (symbol, SymbolSource::Fallback)
        } else {
            let key = normalize_description(&description);
            if let Some(symbol) = self.by_description.get(&key) {
                self.stats.reused += 1;
                (symbol.clone(), SymbolSource::Reused)
            } else if let Some(symbol) = self.mapping.get(&key) {
                self.stats.mapped += 1;
                self.by_description.insert(key, symbol.clone());
                (symbol.clone(), SymbolSource::Mapped)
            } else {
                let symbol = self.disambiguate(generate_symbol(&description, self.max_symbol_length));
                self.stats.generated += 1;
                self.by_description.insert(key, symbol.clone());
                (symbol, SymbolSource::Generated)
            }
        };

        let entry = self
            .stats
            .assignments
            .entry(description.clone())
            .or_insert_with(|| (symbol.clone(), 0));
        entry.0 = symbol.clone();
        entry.1 += 1;

        debug!("row {row_num}: {description} -> {symbol} [{}]", source.label());
        self.assignments.push(SymbolAssignment {
            row: row_num,
            description,
            symbol: symbol.clone(),
            source,
        });
        row.with_symbol(symbol)
    }

    /// First description to produce an acronym keeps it; later ones get 1, 2, ...
    fn disambiguate(&mut self, acronym: String) -> String {
        loop {
            let count = self.acronym_counts.entry(acronym.clone()).or_default();
            *count += 1;
            let candidate = if *count == 1 {
                acronym.clone()
            } else {
                format!("{acronym}{}", *count - 1)
            };
            // A suffixed candidate can equal another description's bare acronym.
            if self.generated.insert(candidate.clone()) {
                if candidate != acronym {
                    warn!("symbol collision on {acronym}, using {candidate}");
                }
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    fn buy(description: &str) -> Transaction {
        Transaction {
            date: "01/15/2024".into(),
            action: "Buy".into(),
            description: description.into(),
            ..Default::default()
        }
    }

    fn run(mapping: &HashMap<String, String>, rows: Vec<Transaction>) -> SymbolReport {
        let settings = Settings::default();
        SymbolResolver::new(mapping, &settings.security_actions, settings.max_symbol_length)
            .resolve_all(rows)
    }

    #[test]
    fn test_generate_symbol_basic() {
        assert_eq!(generate_symbol("ISHARES EDGE MSCI WORLD VALUE FACTOR", 8), "IEMWVF");
        assert_eq!(generate_symbol("APPLE INC", 8), "AI");
    }

    #[test]
    fn test_generate_symbol_empty() {
        assert_eq!(generate_symbol("", 8), "UNKNOWN");
        assert_eq!(generate_symbol("   ", 8), "UNKNOWN");
        assert_eq!(generate_symbol("&.-()[]%,", 8), "UNKNOWN");
    }

    #[test]
    fn test_generate_symbol_special_chars() {
        assert_eq!(generate_symbol("VANGUARD S&P 500 ETF", 8), "VSP5E");
        assert_eq!(generate_symbol("US TREASURY NOTE 4.25%", 8), "UTN42");
        assert_eq!(generate_symbol("ALPHABET INC-CL A", 8), "AICA");
    }

    #[test]
    fn test_generate_symbol_truncation() {
        assert_eq!(generate_symbol("A B C D E F G H I J", 8), "ABCDEFGH");
        assert_eq!(generate_symbol("A B C D E F G H I J", 3), "ABC");
    }

    #[test]
    fn test_generate_symbol_lowercase() {
        assert_eq!(
            generate_symbol("ishares edge msci world", 8),
            generate_symbol("ISHARES EDGE MSCI WORLD", 8)
        );
    }

    #[test]
    fn test_generate_symbol_deterministic() {
        let d = "SCHWAB US DIVIDEND EQUITY ETF";
        assert_eq!(generate_symbol(d, 8), generate_symbol(d, 8));
    }

    #[test]
    fn test_mapped_symbol() {
        let mapping = HashMap::from([("ishares edge msci world".to_string(), "IEMW".to_string())]);
        let report = run(&mapping, vec![buy("ISHARES EDGE MSCI WORLD")]);
        assert_eq!(report.rows[0].symbol, "IEMW");
        assert_eq!(report.stats.missing_symbols, 1);
        assert_eq!(report.stats.mapped, 1);
        assert_eq!(report.stats.generated, 0);
        assert_eq!(report.assignments[0].source, SymbolSource::Mapped);
        assert_eq!(report.assignments[0].row, 2);
    }

    #[test]
    fn test_generated_symbol() {
        let report = run(&HashMap::new(), vec![buy("APPLE INC")]);
        assert_eq!(report.rows[0].symbol, "AI");
        assert_eq!(report.stats.generated, 1);
        assert_eq!(report.stats.mapped, 0);
    }

    #[test]
    fn test_same_description_reuses_symbol() {
        let report = run(
            &HashMap::new(),
            vec![buy("APPLE INC"), buy("  apple inc "), buy("Apple Inc")],
        );
        assert!(report.rows.iter().all(|r| r.symbol == "AI"));
        assert_eq!(report.stats.generated, 1);
        assert_eq!(report.stats.reused, 2);
        assert_eq!(report.assignments[1].source, SymbolSource::Reused);
    }

    #[test]
    fn test_collision_suffixes_in_first_seen_order() {
        let report = run(
            &HashMap::new(),
            vec![
                buy("APPLE INC"),
                buy("AMAZON INDUSTRIES"),
                buy("APPLE INC"),
                buy("ACME INTERNATIONAL"),
                buy("AMAZON INDUSTRIES"),
            ],
        );
        let symbols: Vec<&str> = report.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AI", "AI1", "AI", "AI2", "AI1"]);
    }

    #[test]
    fn test_suffixed_symbol_never_duplicates_a_bare_one() {
        let report = run(
            &HashMap::new(),
            vec![buy("A I 1"), buy("APPLE INC"), buy("ACME INC")],
        );
        let symbols: Vec<&str> = report.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AI1", "AI", "AI2"]);
    }

    #[test]
    fn test_mapping_wins_over_generation_but_not_memo() {
        let mapping = HashMap::from([("apple inc".to_string(), "AAPL".to_string())]);
        let report = run(&mapping, vec![buy("APPLE INC"), buy("apple inc")]);
        assert_eq!(report.rows[0].symbol, "AAPL");
        assert_eq!(report.rows[1].symbol, "AAPL");
        assert_eq!(report.stats.mapped, 1);
        assert_eq!(report.stats.reused, 1);
    }

    #[test]
    fn test_mapped_symbols_do_not_count_as_collisions() {
        let mapping = HashMap::from([("apple inc".to_string(), "AI".to_string())]);
        let report = run(&mapping, vec![buy("APPLE INC"), buy("ACME INC")]);
        let symbols: Vec<&str> = report.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AI", "AI"]);
        assert_eq!(report.assignments[0].source, SymbolSource::Mapped);
        assert_eq!(report.assignments[1].source, SymbolSource::Generated);
    }

    #[test]
    fn test_missing_description_falls_back_per_row() {
        let report = run(&HashMap::new(), vec![buy(""), buy("  ")]);
        assert_eq!(report.rows[0].symbol, "UNKNOWN2");
        assert_eq!(report.rows[1].symbol, "UNKNOWN3");
        assert_eq!(report.stats.fallback, 2);
        assert_eq!(report.stats.missing_descriptions.get("(no description)"), Some(&2));
        assert_eq!(report.assignments[0].source, SymbolSource::Fallback);
    }

    #[test]
    fn test_non_security_rows_untouched() {
        let interest = Transaction {
            action: "Bank Interest".into(),
            description: "SCHWAB1 INT".into(),
            ..Default::default()
        };
        let report = run(&HashMap::new(), vec![interest.clone()]);
        assert_eq!(report.rows[0], interest);
        assert_eq!(report.stats, SymbolStats::default());
        assert!(report.assignments.is_empty());
    }

    #[test]
    fn test_existing_symbols_kept() {
        let mut row = buy("APPLE INC");
        row.symbol = "AAPL".into();
        let report = run(&HashMap::new(), vec![row]);
        assert_eq!(report.rows[0].symbol, "AAPL");
        assert_eq!(report.stats.missing_symbols, 0);
    }

    #[test]
    fn test_assignment_counts() {
        let report = run(&HashMap::new(), vec![buy("APPLE INC"), buy("APPLE INC"), buy("META")]);
        assert_eq!(report.stats.assignments.get("APPLE INC"), Some(&("AI".to_string(), 2)));
        assert_eq!(report.stats.assignments.get("META"), Some(&("M".to_string(), 1)));
        assert_eq!(report.stats.missing_descriptions.get("APPLE INC"), Some(&2));
    }
}
