//! Map layers.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::datasource::{Datasource, DatasourceKind};
use crate::geometry::Envelope;
use crate::projection::DEFAULT_SRS;
use crate::style::LayerStyle;

/// A named layer: a datasource, the SRS its coordinates are in, and how to
/// paint it.
#[derive(Clone)]
pub struct Layer {
    name: String,
    srs: String,
    styles: Vec<String>,
    style: LayerStyle,
    datasource: Option<Arc<dyn Datasource>>,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            srs: DEFAULT_SRS.to_string(),
            styles: Vec::new(),
            style: LayerStyle::default(),
            datasource: None,
        }
    }

    pub fn with_srs(mut self, srs: impl Into<String>) -> Self {
        self.srs = srs.into();
        self
    }

    pub fn with_datasource<D: Datasource + 'static>(mut self, datasource: D) -> Self {
        self.datasource = Some(Arc::new(datasource));
        self
    }

    pub fn with_shared_datasource(mut self, datasource: Arc<dyn Datasource>) -> Self {
        self.datasource = Some(datasource);
        self
    }

    pub fn with_style(mut self, name: impl Into<String>, style: LayerStyle) -> Self {
        self.styles.push(name.into());
        self.style = style;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn srs(&self) -> &str {
        &self.srs
    }

    pub fn styles(&self) -> &[String] {
        &self.styles
    }

    pub fn style(&self) -> &LayerStyle {
        &self.style
    }

    pub fn datasource(&self) -> Option<&Arc<dyn Datasource>> {
        self.datasource.as_ref()
    }

    /// Datasource envelope in the layer's SRS.
    pub fn envelope(&self) -> Option<Envelope> {
        self.datasource.as_ref().map(|ds| ds.envelope())
    }

    pub fn info(&self) -> LayerInfo {
        LayerInfo {
            name: self.name.clone(),
            srs: self.srs.clone(),
            styles: self.styles.clone(),
            datasource: self.datasource.as_ref().map(|ds| ds.kind()),
        }
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("name", &self.name)
            .field("srs", &self.srs)
            .field("styles", &self.styles)
            .field("has_datasource", &self.datasource.is_some())
            .finish()
    }
}

/// Summary of a layer as listed by [`Map::layers`](super::Map::layers).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerInfo {
    pub name: String,
    pub srs: String,
    pub styles: Vec<String>,
    pub datasource: Option<DatasourceKind>,
}
