//! Handler and factory registry
//!
//! One constructed [`Registry`] is owned by the host and shared (behind an
//! `Arc`) by every dispatch. Registration is a configuration-time operation:
//! it takes `&mut self`, so nothing can be registered while dispatches hold
//! the registry.
//!
//! Selection is "first eligible wins", but registration refuses a factory
//! whose eligibility overlaps an already registered one, and a second
//! handler for the same event type. The first eligible is therefore the only
//! eligible.

use tracing::debug;

use crate::config::{EngineConfig, HandlerKind, HandlerRoute};
use crate::dispatch::handler::{EventHandler, MappingHandler, MatchingHandler};
use crate::error::ConfigError;
use crate::mapping::reader::{
    DelimitedReaderFactory, EdifactReaderFactory, MarcReaderFactory, ReaderFactory,
    StaticValueReaderFactory,
};
use crate::mapping::writer::{JsonWriterFactory, MarcWriterFactory, WriterFactory};
use crate::matching::http_loader::HttpRecordLoader;
use crate::matching::loader::MatchValueLoader;
use crate::matching::reader::{
    DelimitedMatchValueReader, EdifactMatchValueReader, MarcMatchValueReader, MatchValueReader,
    StaticMatchValueReader,
};
use crate::models::{DataValueType, EntityType};

const DATA_VALUE_TYPES: [DataValueType; 2] =
    [DataValueType::ValueFromRecord, DataValueType::StaticValue];

#[derive(Default)]
pub struct Registry {
    handlers: Vec<Box<dyn EventHandler>>,
    reader_factories: Vec<Box<dyn ReaderFactory>>,
    writer_factories: Vec<Box<dyn WriterFactory>>,
    match_value_readers: Vec<Box<dyn MatchValueReader>>,
    match_value_loaders: Vec<Box<dyn MatchValueLoader>>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in readers, writers and match value readers.
    /// Handlers and loaders are deployment specific and left to the host.
    pub fn with_defaults() -> Self {
        Self {
            handlers: Vec::new(),
            reader_factories: vec![
                Box::new(MarcReaderFactory),
                Box::new(EdifactReaderFactory),
                Box::new(DelimitedReaderFactory),
                Box::new(StaticValueReaderFactory),
            ],
            writer_factories: vec![Box::new(JsonWriterFactory), Box::new(MarcWriterFactory)],
            match_value_readers: vec![
                Box::new(MarcMatchValueReader),
                Box::new(EdifactMatchValueReader),
                Box::new(DelimitedMatchValueReader),
                Box::new(StaticMatchValueReader),
            ],
            match_value_loaders: Vec::new(),
        }
    }

    /// Registry for a loaded configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Self::from_routes(&config.routes)
    }

    /// Built-in factories, the HTTP storage loader for domain entities, and
    /// one handler per configured route.
    pub fn from_routes(routes: &[HandlerRoute]) -> Result<Self, ConfigError> {
        let mut registry = Self::with_defaults();
        registry.register_match_value_loader(HttpRecordLoader::new())?;
        for route in routes {
            match route.kind {
                HandlerKind::Mapping => {
                    registry.register_handler(MappingHandler::new(&route.handles, &route.produces))?
                }
                HandlerKind::Matching => registry.register_handler(MatchingHandler::new(
                    &route.handles,
                    &route.produces,
                    route.produces_on_miss.as_deref().unwrap_or(&route.produces),
                ))?,
            }
        }
        Ok(registry)
    }

    // -------------------------------------------------------------------------
    // Handlers
    // -------------------------------------------------------------------------

    pub fn register_handler<H: EventHandler + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), ConfigError> {
        if self.handler_for(handler.handles()).is_some() {
            return Err(ConfigError::DuplicateHandler(handler.handles().to_string()));
        }
        debug!(handles = handler.handles(), produces = handler.produces(), "Registered handler");
        self.handlers.push(Box::new(handler));
        Ok(())
    }

    pub fn handler_for(&self, event_type: &str) -> Option<&dyn EventHandler> {
        self.handlers
            .iter()
            .find(|h| h.handles() == event_type)
            .map(|h| h.as_ref())
    }

    pub fn handlers(&self) -> impl Iterator<Item = &dyn EventHandler> {
        self.handlers.iter().map(|h| h.as_ref())
    }

    pub fn clear_handlers(&mut self) {
        self.handlers.clear();
    }

    // -------------------------------------------------------------------------
    // Mapping factories
    // -------------------------------------------------------------------------

    pub fn register_reader_factory<F: ReaderFactory + 'static>(
        &mut self,
        factory: F,
    ) -> Result<(), ConfigError> {
        if let Some(entity_type) = EntityType::ALL
            .into_iter()
            .find(|t| factory.is_eligible(*t) && self.reader_factory(*t).is_ok())
        {
            return Err(ConfigError::AmbiguousFactory {
                kind: "reader",
                entity_type,
            });
        }
        self.reader_factories.push(Box::new(factory));
        Ok(())
    }

    pub fn reader_factory(&self, entity_type: EntityType) -> Result<&dyn ReaderFactory, ConfigError> {
        self.reader_factories
            .iter()
            .find(|f| f.is_eligible(entity_type))
            .map(|f| f.as_ref())
            .ok_or(ConfigError::NoFactoryFound {
                kind: "reader",
                entity_type,
            })
    }

    pub fn clear_reader_factories(&mut self) {
        self.reader_factories.clear();
    }

    pub fn register_writer_factory<F: WriterFactory + 'static>(
        &mut self,
        factory: F,
    ) -> Result<(), ConfigError> {
        if let Some(entity_type) = EntityType::ALL
            .into_iter()
            .find(|t| factory.is_eligible(*t) && self.writer_factory(*t).is_ok())
        {
            return Err(ConfigError::AmbiguousFactory {
                kind: "writer",
                entity_type,
            });
        }
        self.writer_factories.push(Box::new(factory));
        Ok(())
    }

    pub fn writer_factory(&self, entity_type: EntityType) -> Result<&dyn WriterFactory, ConfigError> {
        self.writer_factories
            .iter()
            .find(|f| f.is_eligible(entity_type))
            .map(|f| f.as_ref())
            .ok_or(ConfigError::NoFactoryFound {
                kind: "writer",
                entity_type,
            })
    }

    pub fn clear_writer_factories(&mut self) {
        self.writer_factories.clear();
    }

    // -------------------------------------------------------------------------
    // Matching readers and loaders
    // -------------------------------------------------------------------------

    pub fn register_match_value_reader<R: MatchValueReader + 'static>(
        &mut self,
        reader: R,
    ) -> Result<(), ConfigError> {
        for entity_type in EntityType::ALL {
            for data_value_type in DATA_VALUE_TYPES {
                if reader.is_eligible(entity_type, data_value_type)
                    && self.match_value_reader(entity_type, data_value_type).is_ok()
                {
                    return Err(ConfigError::AmbiguousFactory {
                        kind: "match value reader",
                        entity_type,
                    });
                }
            }
        }
        self.match_value_readers.push(Box::new(reader));
        Ok(())
    }

    pub fn match_value_reader(
        &self,
        entity_type: EntityType,
        data_value_type: DataValueType,
    ) -> Result<&dyn MatchValueReader, ConfigError> {
        self.match_value_readers
            .iter()
            .find(|r| r.is_eligible(entity_type, data_value_type))
            .map(|r| r.as_ref())
            .ok_or_else(|| ConfigError::NoMatchValueReader {
                entity_type,
                data_value_type: data_value_type.to_string(),
            })
    }

    pub fn clear_match_value_readers(&mut self) {
        self.match_value_readers.clear();
    }

    pub fn register_match_value_loader<L: MatchValueLoader + 'static>(
        &mut self,
        loader: L,
    ) -> Result<(), ConfigError> {
        if let Some(entity_type) = EntityType::ALL
            .into_iter()
            .find(|t| loader.is_eligible(*t) && self.match_value_loader(*t).is_ok())
        {
            return Err(ConfigError::AmbiguousFactory {
                kind: "match value loader",
                entity_type,
            });
        }
        self.match_value_loaders.push(Box::new(loader));
        Ok(())
    }

    pub fn match_value_loader(
        &self,
        entity_type: EntityType,
    ) -> Result<&dyn MatchValueLoader, ConfigError> {
        self.match_value_loaders
            .iter()
            .find(|l| l.is_eligible(entity_type))
            .map(|l| l.as_ref())
            .ok_or(ConfigError::NoMatchValueLoader(entity_type))
    }

    pub fn clear_match_value_loaders(&mut self) {
        self.match_value_loaders.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::loader::InMemoryLoader;

    #[test]
    fn test_defaults_cover_every_format() {
        let registry = Registry::with_defaults();
        for entity_type in EntityType::ALL {
            assert!(registry.reader_factory(entity_type).is_ok(), "{}", entity_type);
        }
        assert_eq!(
            registry.writer_factory(EntityType::Holdings).unwrap().name(),
            "JSON writer"
        );
        assert_eq!(
            registry.writer_factory(EntityType::MarcAuthority).unwrap().name(),
            "MARC writer"
        );
        assert!(matches!(
            registry.writer_factory(EntityType::EdifactInvoice),
            Err(ConfigError::NoFactoryFound { kind: "writer", .. })
        ));
        assert!(matches!(
            registry.match_value_loader(EntityType::Instance),
            Err(ConfigError::NoMatchValueLoader(EntityType::Instance))
        ));
    }

    #[test]
    fn test_overlapping_factories_are_rejected() {
        let mut registry = Registry::with_defaults();
        let err = registry.register_reader_factory(MarcReaderFactory).unwrap_err();
        assert_eq!(
            err,
            ConfigError::AmbiguousFactory {
                kind: "reader",
                entity_type: EntityType::MarcBibliographic
            }
        );

        registry.clear_reader_factories();
        assert!(registry.register_reader_factory(MarcReaderFactory).is_ok());

        let err = registry
            .register_match_value_reader(StaticMatchValueReader)
            .unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousFactory { .. }));
    }

    #[test]
    fn test_duplicate_handlers_are_rejected() {
        let mut registry = Registry::new();
        registry
            .register_handler(MappingHandler::new("DI_A", "DI_B"))
            .unwrap();
        let err = registry
            .register_handler(MappingHandler::new("DI_A", "DI_C"))
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateHandler("DI_A".into()));
        assert_eq!(registry.handler_for("DI_A").unwrap().produces(), "DI_B");

        registry.clear_handlers();
        assert!(registry.handler_for("DI_A").is_none());
    }

    #[test]
    fn test_loader_registration() {
        let mut registry = Registry::new();
        registry
            .register_match_value_loader(InMemoryLoader::new(EntityType::Instance, vec![]))
            .unwrap();
        assert!(registry.match_value_loader(EntityType::Instance).is_ok());
        assert!(registry
            .register_match_value_loader(InMemoryLoader::new(EntityType::Instance, vec![]))
            .is_err());
        assert!(registry
            .register_match_value_loader(InMemoryLoader::new(EntityType::Item, vec![]))
            .is_ok());
    }

    #[test]
    fn test_from_routes() {
        let routes = vec![
            HandlerRoute {
                kind: HandlerKind::Matching,
                handles: "DI_SRS_MARC_BIB_RECORD_CREATED".into(),
                produces: "DI_INVENTORY_INSTANCE_MATCHED".into(),
                produces_on_miss: Some("DI_INVENTORY_INSTANCE_NOT_MATCHED".into()),
            },
            HandlerRoute {
                kind: HandlerKind::Mapping,
                handles: "DI_INVENTORY_INSTANCE_MATCHED".into(),
                produces: "DI_INVENTORY_INSTANCE_UPDATED".into(),
                produces_on_miss: None,
            },
        ];
        let registry = Registry::from_routes(&routes).unwrap();
        let matcher = registry.handler_for("DI_SRS_MARC_BIB_RECORD_CREATED").unwrap();
        assert_eq!(matcher.produces_on_miss(), "DI_INVENTORY_INSTANCE_NOT_MATCHED");
        assert!(registry.match_value_loader(EntityType::Holdings).is_ok());
    }
}
