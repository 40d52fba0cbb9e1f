use crate::domain::Registry;
use crate::vocabulary::{
    CONDITION_SYNONYMS, ConceptTable, EXPERIMENT_SYNONYMS, RNA_EXPERIMENT_CONCEPTS,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymConcept {
    pub key: String,
    pub terms: Vec<String>,
}

/// Canonical concept key → synonymous surface forms, in lookup order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SynonymTable {
    concepts: Vec<SynonymConcept>,
}

impl SynonymTable {
    pub fn new(concepts: Vec<SynonymConcept>) -> Self {
        Self { concepts }
    }

    pub fn from_static(table: ConceptTable) -> Self {
        Self {
            concepts: table
                .iter()
                .map(|(key, terms)| SynonymConcept {
                    key: key.to_string(),
                    terms: terms.iter().map(|term| term.to_string()).collect(),
                })
                .collect(),
        }
    }

    pub fn conditions() -> Self {
        Self::from_static(CONDITION_SYNONYMS)
    }

    pub fn experiments() -> Self {
        Self::from_static(EXPERIMENT_SYNONYMS)
    }

    /// Resolves free text to a concept.
    ///
    /// An exact match on the key or any surface form wins over a concept
    /// whose key merely occurs inside the text; ties go to table order.
    pub fn lookup(&self, text: &str) -> Option<&SynonymConcept> {
        let needle = normalize(text);
        if needle.is_empty() {
            return None;
        }
        self.concepts
            .iter()
            .find(|concept| {
                normalize(&concept.key) == needle
                    || concept.terms.iter().any(|term| normalize(term) == needle)
            })
            .or_else(|| {
                self.concepts
                    .iter()
                    .find(|concept| contains_phrase(&needle, &normalize(&concept.key)))
            })
    }

    /// Terms to search for `text`: the concept's surface forms, or the text
    /// itself when nothing matches.
    pub fn expand(&self, text: &str) -> Vec<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        match self.lookup(trimmed) {
            Some(concept) if !concept.terms.is_empty() => concept.terms.clone(),
            _ => vec![trimmed.to_string()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    conditions: SynonymTable,
    experiments: SynonymTable,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::with_tables(SynonymTable::conditions(), SynonymTable::experiments())
    }

    pub fn with_tables(conditions: SynonymTable, experiments: SynonymTable) -> Self {
        Self {
            conditions,
            experiments,
        }
    }

    pub fn build(
        &self,
        registry: Registry,
        organism: &str,
        condition: &str,
        experiment: &str,
    ) -> String {
        self.build_with_terms(registry, organism, condition, experiment, &[])
    }

    pub fn build_with_terms(
        &self,
        registry: Registry,
        organism: &str,
        condition: &str,
        experiment: &str,
        additional_terms: &[String],
    ) -> String {
        let mut groups = Vec::new();

        let organism = organism.trim();
        if !organism.is_empty() {
            let term = quote(organism);
            if registry.has_organism_field() {
                groups.push(format!("({term}[Organism])"));
            } else {
                groups.push(format!("({term})"));
            }
        }

        if let Some(group) = or_group(&self.conditions.expand(condition)) {
            groups.push(group);
        }
        if let Some(group) = or_group(&self.experiments.expand(experiment)) {
            groups.push(group);
        }
        for term in additional_terms {
            if let Some(group) = or_group(std::slice::from_ref(term)) {
                groups.push(group);
            }
        }

        let rna = self.is_rna_experiment(experiment);
        match registry {
            Registry::Sra if rna => groups.push("\"rna seq\"[Strategy]".to_string()),
            Registry::Geo if rna => groups.push(
                "\"expression profiling by high throughput sequencing\"[DataSet Type]"
                    .to_string(),
            ),
            _ => {}
        }

        groups.join(" AND ")
    }

    fn is_rna_experiment(&self, experiment: &str) -> bool {
        self.experiments
            .lookup(experiment)
            .map(|concept| RNA_EXPERIMENT_CONCEPTS.contains(&concept.key.as_str()))
            .unwrap_or(false)
    }
}

/// Checks that a query is non-blank, has balanced parentheses and quotes, and
/// no empty group. Text inside a quoted term is literal.
pub fn validate_query(query: &str) -> bool {
    if query.trim().is_empty() {
        return false;
    }
    let mut depth = 0i32;
    let mut quoted = false;
    let mut previous = ' ';
    for ch in query.chars() {
        if quoted {
            if ch == '"' {
                quoted = false;
            }
        } else {
            match ch {
                '"' => quoted = true,
                '(' => depth += 1,
                ')' if previous == '(' => return false,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return false;
                    }
                }
                _ => {}
            }
        }
        if !ch.is_whitespace() {
            previous = ch;
        }
    }
    depth == 0 && !quoted
}

fn or_group(terms: &[String]) -> Option<String> {
    let quoted = terms
        .iter()
        .map(|term| term.trim())
        .filter(|term| !term.is_empty())
        .map(quote)
        .collect::<Vec<_>>();
    if quoted.is_empty() {
        return None;
    }
    Some(format!("({})", quoted.join(" OR ")))
}

fn quote(term: &str) -> String {
    format!("\"{}\"", term.replace('"', ""))
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase().replace('_', " ")
}

fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    haystack
        .match_indices(phrase)
        .any(|(start, _)| {
            let end = start + phrase.len();
            let before = haystack[..start].chars().next_back();
            let after = haystack[end..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
}
