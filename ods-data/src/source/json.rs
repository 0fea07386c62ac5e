//! Feature source backed by a JSON document on disk.

use std::io::BufReader;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{FeatureSource, FeatureStream, SourceError, SourceInfo};
use crate::{Crs, FeatureQuery, RawFeature};

/// Feature collection of a single feature type.
///
/// ```
/// use ods_data::FeatureDocument;
///
/// let document: FeatureDocument = serde_json::from_str(
///     r#"{"feature_type": "bag:pand", "crs": "EPSG:28992", "id_attribute": "identificatie", "features": []}"#,
/// )
/// .expect("valid document");
/// assert_eq!(document.crs.as_str(), "EPSG:28992");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDocument {
    /// Feature type held by the document.
    pub feature_type: String,
    /// Coordinate system of the geometries.
    pub crs: Crs,
    /// Property holding the stable feature id.
    pub id_attribute: String,
    /// Features in document order.
    #[serde(default)]
    pub features: Vec<RawFeature>,
}

/// Reads a [`FeatureDocument`] from a UTF-8 path.
///
/// The file is read during [`FeatureSource::initialise`].
#[derive(Debug, Clone)]
pub struct JsonFeatureSource {
    path: Utf8PathBuf,
    document: Option<FeatureDocument>,
}

impl JsonFeatureSource {
    /// Source reading from `path`.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            document: None,
        }
    }

    /// Path of the backing document.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn load(&self) -> Result<FeatureDocument, SourceError> {
        let file = fs_utf8::File::open_ambient(&self.path, ambient_authority()).map_err(|source| {
            SourceError::Read {
                path: self.path.clone(),
                source,
            }
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| SourceError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

impl FeatureSource for JsonFeatureSource {
    fn initialise(&mut self, feature_type: &str) -> Result<SourceInfo, SourceError> {
        let document = self.load()?;
        if document.feature_type != feature_type {
            return Err(SourceError::UnknownFeatureType {
                feature_type: feature_type.to_owned(),
                available: document.feature_type,
            });
        }
        info!(
            "loaded {} {feature_type} features from {}",
            document.features.len(),
            self.path
        );
        let info = SourceInfo {
            crs: document.crs.clone(),
            id_attribute: document.id_attribute.clone(),
        };
        self.document = Some(document);
        Ok(info)
    }

    fn features(&mut self, query: &FeatureQuery) -> Result<FeatureStream<'_>, SourceError> {
        let document = self.document.as_ref().ok_or(SourceError::NotInitialised)?;
        let id_attribute = document.id_attribute.as_str();
        let requested = query.properties.clone();
        if let Some(names) = &requested {
            debug!("projecting {} onto {} properties", self.path, names.len());
        }
        Ok(Box::new(document.features.iter().map(move |feature| {
            let mut feature = feature.clone();
            if let Some(names) = &requested {
                feature
                    .properties
                    .retain(|name, _| name == id_attribute || names.contains(name));
            }
            Ok(feature)
        })))
    }
}
