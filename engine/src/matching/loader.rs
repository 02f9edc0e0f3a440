//! Match value loaders
//!
//! A loader looks up existing records of one entity type by a field value.
//! Loading is the one asynchronous step of matching: real loaders talk to a
//! storage backend.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{MatchingError, MatchingResult};
use crate::mapping::field_path::FieldPath;
use crate::models::{EntityType, MatchCriterion, ProcessingContext};
use crate::value::Value;

/// Lookup of existing records by one field.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadQuery {
    pub entity_type: EntityType,
    /// Existing-record field, e.g. `instance.hrid` or `item.identifiers[].value`.
    pub field_path: String,
    pub criterion: MatchCriterion,
    /// Incoming value: a string, a list (any of), or a date range.
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadResult {
    Found(JsonValue),
    NotFound,
}

/// Whether an existing value satisfies the criterion against an incoming one.
pub fn criterion_matches(criterion: MatchCriterion, existing: &str, incoming: &str) -> bool {
    match criterion {
        MatchCriterion::ExactlyMatches => existing == incoming,
        MatchCriterion::ExistingValueContainsIncomingValue => existing.contains(incoming),
        MatchCriterion::IncomingValueContainsExistingValue => incoming.contains(existing),
        MatchCriterion::ExistingValueBeginsWith => existing.starts_with(incoming),
        MatchCriterion::IncomingValueBeginsWith => incoming.starts_with(existing),
        MatchCriterion::ExistingValueEndsWith => existing.ends_with(incoming),
        MatchCriterion::IncomingValueEndsWith => incoming.ends_with(existing),
    }
}

fn escape_cql(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '*' | '?' | '^') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Most `==` clauses one incoming value may expand to. Longer values are
/// queried by their words instead and narrowed by [`single_match`].
pub const MAX_CANDIDATE_CLAUSES: usize = 32;

/// Upper bound on [`incoming_candidates`] for a value of `n` characters.
fn candidate_bound(criterion: MatchCriterion, n: usize) -> usize {
    match criterion {
        MatchCriterion::IncomingValueContainsExistingValue => n * (n + 1) / 2,
        _ => n,
    }
}

/// Every value an existing field could hold for an `INCOMING_*` criterion to
/// hold: prefixes, suffixes, or substrings of the incoming value.
fn incoming_candidates(criterion: MatchCriterion, incoming: &str) -> Vec<String> {
    let chars: Vec<char> = incoming.chars().collect();
    let n = chars.len();
    let slice = |from: usize, to: usize| chars[from..to].iter().collect::<String>();

    let mut out: Vec<String> = match criterion {
        MatchCriterion::IncomingValueBeginsWith => (1..=n).map(|end| slice(0, end)).collect(),
        MatchCriterion::IncomingValueEndsWith => (0..n).map(|start| slice(start, n)).collect(),
        MatchCriterion::IncomingValueContainsExistingValue => (0..n)
            .flat_map(|start| (start + 1..=n).map(move |end| (start, end)))
            .map(|(start, end)| slice(start, end))
            .collect(),
        _ => vec![incoming.to_string()],
    };
    out.sort();
    out.dedup();
    out
}

/// `field any "w1 w2 ..."` over the distinct words of `text`.
fn any_word_clause(field: &str, text: &str) -> String {
    let mut words: Vec<&str> = Vec::new();
    for word in text.split_whitespace() {
        if !words.contains(&word) {
            words.push(word);
        }
    }
    let words: Vec<String> = words.into_iter().map(escape_cql).collect();
    format!("{field} any \"{}\"", words.join(" "))
}

impl LoadQuery {
    pub fn new(
        entity_type: EntityType,
        field_path: impl Into<String>,
        criterion: MatchCriterion,
        value: Value,
    ) -> Self {
        Self {
            entity_type,
            field_path: field_path.into(),
            criterion,
            value,
        }
    }

    /// Path segments below the entity root, without array markers.
    pub fn field_segments(&self) -> MatchingResult<Vec<String>> {
        let path = FieldPath::parse(&self.field_path)
            .map_err(|e| MatchingError::InvalidExpression(e.to_string()))?
            .strip_root(self.entity_type.root_key());
        Ok(path.segments().iter().map(|s| s.name.clone()).collect())
    }

    /// CQL query selecting candidate records.
    pub fn to_cql(&self) -> MatchingResult<String> {
        let field = self.field_segments()?.join(".");

        if let Value::DateRange { from, to } = &self.value {
            return Ok(format!(
                "({field} >= \"{}\" and {field} <= \"{}T23:59:59.999\")",
                escape_cql(from),
                escape_cql(to)
            ));
        }

        let clauses: Vec<String> = self
            .value
            .texts()
            .iter()
            .flat_map(|text| {
                let escaped = escape_cql(text);
                match self.criterion {
                    MatchCriterion::ExactlyMatches => vec![format!("{field} == \"{escaped}\"")],
                    MatchCriterion::ExistingValueContainsIncomingValue => {
                        vec![format!("{field} = \"*{escaped}*\"")]
                    }
                    MatchCriterion::ExistingValueBeginsWith => {
                        vec![format!("{field} = \"{escaped}*\"")]
                    }
                    MatchCriterion::ExistingValueEndsWith => {
                        vec![format!("{field} = \"*{escaped}\"")]
                    }
                    incoming if candidate_bound(incoming, text.chars().count()) > MAX_CANDIDATE_CLAUSES => {
                        vec![any_word_clause(&field, text)]
                    }
                    incoming => incoming_candidates(incoming, text)
                        .iter()
                        .map(|c| format!("{field} == \"{}\"", escape_cql(c)))
                        .collect(),
                }
            })
            .collect();

        match clauses.len() {
            0 => Err(MatchingError::InvalidExpression(
                "match query has no value to compare".to_string(),
            )),
            1 => Ok(clauses.into_iter().collect()),
            _ => Ok(format!("({})", clauses.join(" or "))),
        }
    }

    /// Whether an existing record satisfies the query.
    pub fn accepts(&self, record: &JsonValue) -> MatchingResult<bool> {
        let segments = self.field_segments()?;
        let existing = field_values(record, &segments);

        Ok(match &self.value {
            Value::DateRange { from, to } => existing.iter().any(|v| {
                let day = v.get(..10).unwrap_or(v);
                day >= from.as_str() && day <= to.as_str()
            }),
            value => {
                let incoming = value.texts();
                existing.iter().any(|e| {
                    incoming
                        .iter()
                        .any(|i| criterion_matches(self.criterion, e, i))
                })
            }
        })
    }
}

/// Scalar values at a path, descending through arrays.
pub fn field_values(record: &JsonValue, segments: &[String]) -> Vec<String> {
    let Some((head, rest)) = segments.split_first() else {
        return match record {
            JsonValue::String(s) => vec![s.clone()],
            JsonValue::Number(n) => vec![n.to_string()],
            JsonValue::Bool(b) => vec![b.to_string()],
            JsonValue::Array(items) => items.iter().flat_map(|i| field_values(i, &[])).collect(),
            _ => Vec::new(),
        };
    };
    match record {
        JsonValue::Object(obj) => obj
            .get(head)
            .map(|v| field_values(v, rest))
            .unwrap_or_default(),
        JsonValue::Array(items) => items.iter().flat_map(|i| field_values(i, segments)).collect(),
        _ => Vec::new(),
    }
}

/// Pick the single match out of the candidates the query accepts.
pub fn single_match(query: &LoadQuery, candidates: Vec<JsonValue>) -> MatchingResult<LoadResult> {
    let mut hits = Vec::new();
    for candidate in candidates {
        if query.accepts(&candidate)? {
            hits.push(candidate);
        }
    }
    match hits.len() {
        0 => Ok(LoadResult::NotFound),
        1 => Ok(LoadResult::Found(hits.remove(0))),
        count => Err(MatchingError::MultipleMatches {
            entity_type: query.entity_type,
            count,
        }),
    }
}

/// Loads existing records of the entity types it is eligible for.
#[async_trait]
pub trait MatchValueLoader: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_eligible(&self, entity_type: EntityType) -> bool;

    async fn load(&self, query: &LoadQuery, ctx: &ProcessingContext) -> MatchingResult<LoadResult>;
}

/// Loader over a fixed set of records of one entity type.
#[derive(Debug, Clone)]
pub struct InMemoryLoader {
    entity_type: EntityType,
    records: Vec<JsonValue>,
}

impl InMemoryLoader {
    pub fn new(entity_type: EntityType, records: Vec<JsonValue>) -> Self {
        Self {
            entity_type,
            records,
        }
    }
}

#[async_trait]
impl MatchValueLoader for InMemoryLoader {
    fn name(&self) -> &'static str {
        "in-memory loader"
    }

    fn is_eligible(&self, entity_type: EntityType) -> bool {
        entity_type == self.entity_type
    }

    async fn load(&self, query: &LoadQuery, _ctx: &ProcessingContext) -> MatchingResult<LoadResult> {
        debug!(
            entity_type = %query.entity_type,
            field = %query.field_path,
            candidates = self.records.len(),
            "Loading from memory"
        );
        single_match(query, self.records.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instances() -> Vec<JsonValue> {
        vec![
            json!({ "id": "i-1", "hrid": "in00001", "identifiers": [{ "value": "(OCoLC)123" }] }),
            json!({ "id": "i-2", "hrid": "in00002", "identifiers": [{ "value": "(OCoLC)456" }, { "value": "isbn-9" }] }),
            json!({ "id": "i-3", "hrid": "in00003", "metadata": { "createdDate": "2024-02-10T08:00:00.000+0000" } }),
        ]
    }

    fn query(path: &str, criterion: MatchCriterion, value: Value) -> LoadQuery {
        LoadQuery::new(EntityType::Instance, path, criterion, value)
    }

    #[test]
    fn test_criteria() {
        use MatchCriterion::*;
        assert!(criterion_matches(ExactlyMatches, "abc", "abc"));
        assert!(criterion_matches(ExistingValueContainsIncomingValue, "xabcx", "abc"));
        assert!(criterion_matches(IncomingValueContainsExistingValue, "abc", "xabcx"));
        assert!(criterion_matches(ExistingValueBeginsWith, "abcdef", "abc"));
        assert!(criterion_matches(IncomingValueBeginsWith, "abc", "abcdef"));
        assert!(criterion_matches(ExistingValueEndsWith, "xyzabc", "abc"));
        assert!(criterion_matches(IncomingValueEndsWith, "abc", "xyzabc"));
        assert!(!criterion_matches(ExistingValueBeginsWith, "abc", "abcdef"));
    }

    #[test]
    fn test_cql() {
        let q = query("instance.hrid", MatchCriterion::ExactlyMatches, Value::String("in0\"1".into()));
        assert_eq!(q.to_cql().unwrap(), "hrid == \"in0\\\"1\"");

        let q = query(
            "instance.identifiers[].value",
            MatchCriterion::ExistingValueBeginsWith,
            Value::List(vec!["a".into(), "b".into()]),
        );
        assert_eq!(
            q.to_cql().unwrap(),
            "(identifiers.value = \"a*\" or identifiers.value = \"b*\")"
        );

        let q = query("instance.hrid", MatchCriterion::IncomingValueBeginsWith, Value::String("ab".into()));
        assert_eq!(q.to_cql().unwrap(), "(hrid == \"a\" or hrid == \"ab\")");

        let q = query("instance.hrid", MatchCriterion::ExactlyMatches, Value::Missing);
        assert!(q.to_cql().is_err());
    }

    #[test]
    fn test_long_incoming_value_queries_by_words() {
        let title = "The semantic web: a guide to the future of XML, web services, and knowledge management. ".repeat(4);
        let q = query(
            "instance.title",
            MatchCriterion::IncomingValueContainsExistingValue,
            Value::String(title.clone()),
        );
        let cql = q.to_cql().unwrap();
        assert!(cql.starts_with("title any \""));
        assert!(cql.len() < 200);
        assert_eq!(cql.matches("semantic").count(), 1);

        // results are still narrowed with the real criterion
        assert!(q.accepts(&json!({ "title": "semantic web" })).unwrap());
        assert!(!q.accepts(&json!({ "title": "semantic webs" })).unwrap());

        let q = query(
            "instance.title",
            MatchCriterion::IncomingValueBeginsWith,
            Value::String("x".repeat(MAX_CANDIDATE_CLAUSES)),
        );
        assert_eq!(q.to_cql().unwrap().matches(" or ").count(), MAX_CANDIDATE_CLAUSES - 1);
    }

    #[tokio::test]
    async fn test_in_memory_single_match() {
        let loader = InMemoryLoader::new(EntityType::Instance, instances());
        let ctx = ProcessingContext::new("TEST");

        let q = query(
            "instance.identifiers[].value",
            MatchCriterion::ExactlyMatches,
            Value::String("isbn-9".into()),
        );
        match loader.load(&q, &ctx).await.unwrap() {
            LoadResult::Found(record) => assert_eq!(record["id"], "i-2"),
            LoadResult::NotFound => panic!("expected a match"),
        }

        let q = query("instance.hrid", MatchCriterion::ExactlyMatches, Value::String("in09999".into()));
        assert_eq!(loader.load(&q, &ctx).await.unwrap(), LoadResult::NotFound);
    }

    #[tokio::test]
    async fn test_in_memory_multiple_matches() {
        let loader = InMemoryLoader::new(EntityType::Instance, instances());
        let q = query(
            "instance.hrid",
            MatchCriterion::ExistingValueBeginsWith,
            Value::String("in0000".into()),
        );
        let err = loader.load(&q, &ProcessingContext::new("TEST")).await.unwrap_err();
        assert!(matches!(err, MatchingError::MultipleMatches { count: 3, .. }));
    }

    #[tokio::test]
    async fn test_in_memory_date_range() {
        let loader = InMemoryLoader::new(EntityType::Instance, instances());
        let q = query(
            "instance.metadata.createdDate",
            MatchCriterion::ExactlyMatches,
            Value::DateRange {
                from: "2024-02-01".into(),
                to: "2024-02-10".into(),
            },
        );
        match loader.load(&q, &ProcessingContext::new("TEST")).await.unwrap() {
            LoadResult::Found(record) => assert_eq!(record["id"], "i-3"),
            LoadResult::NotFound => panic!("expected a match"),
        }
    }
}
