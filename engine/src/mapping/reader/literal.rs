//! Static-value reading. The incoming record is ignored; rules carry quoted
//! literals only.

use std::sync::Arc;

use super::{RecordReader, RecordSource};
use crate::error::{MappingError, MappingResult};
use crate::models::MappingParameters;

pub struct LiteralSource;

impl RecordSource for LiteralSource {
    fn extract(&self, reference: &str) -> MappingResult<Vec<String>> {
        Err(MappingError::InvalidExpression {
            expression: reference.to_string(),
            message: "static-value rules accept quoted literals only".to_string(),
        })
    }
}

pub(crate) fn reader(params: Arc<MappingParameters>) -> RecordReader<LiteralSource> {
    RecordReader::new(LiteralSource, params)
}
