use crate::cache::LoadCache;
use crate::collection::FeatureCollection;
use crate::config::PipelineConfig;
use crate::error::{JoinError, Side};
use crate::export::{export_artifact, ExportArtifact};
use crate::join::{join_with, JoinOutcome, JoinSpec};
use crate::preview::{preview, Preview};
use log::{error, warn};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Warning(String),
    Error(String),
}

impl Notice {
    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Notice::Success(m) | Notice::Warning(m) | Notice::Error(m) => m,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Success(m) => write!(f, "{m}"),
            Notice::Warning(m) => write!(f, "warning: {m}"),
            Notice::Error(m) => write!(f, "error: {m}"),
        }
    }
}

#[derive(Debug)]
pub struct Session {
    config: PipelineConfig,
    cache: LoadCache,
    left: Option<Arc<FeatureCollection>>,
    right: Option<Arc<FeatureCollection>>,
    result: Option<JoinOutcome>,
}

impl Default for Session {
    fn default() -> Self {
        Session::new(PipelineConfig::default())
    }
}

impl Session {
    pub fn new(config: PipelineConfig) -> Self {
        Session {
            cache: LoadCache::with_capacity(config.cache_entries),
            config,
            left: None,
            right: None,
            result: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // Loads an upload into one side. On failure the side is cleared and the
    // other side is left as it was.
    pub fn load(&mut self, side: Side, name: &str, bytes: &[u8]) -> Notice {
        let loaded = self.cache.load(name, bytes);
        let slot = match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        };
        match loaded {
            Ok(collection) => {
                let notice = Notice::Success(format!(
                    "Loaded {} features from {}",
                    collection.len(),
                    name
                ));
                *slot = Some(collection);
                notice
            }
            Err(e) => {
                error!("{}", e);
                *slot = None;
                Notice::Error(format!("Failed to load file {name}: {e}"))
            }
        }
    }

    pub fn input(&self, side: Side) -> Option<&FeatureCollection> {
        match side {
            Side::Left => self.left.as_deref(),
            Side::Right => self.right.as_deref(),
        }
    }

    pub fn preview(&self, side: Side) -> Option<Preview> {
        self.input(side)
            .map(|collection| preview(collection, self.config.preview_rows))
    }

    // Runs one join over the loaded inputs. A successful join, including
    // one without matches, replaces the previous result; a failed one leaves
    // it untouched.
    pub fn run_join(&mut self, spec: &JoinSpec) -> Vec<Notice> {
        let (Some(left), Some(right)) = (self.left.as_deref(), self.right.as_deref()) else {
            let side = if self.left.is_none() { Side::Left } else { Side::Right };
            return vec![Notice::Error(JoinError::MissingInput(side).to_string())];
        };

        match join_with(left, right, spec, &self.config.join_options()) {
            Ok(outcome) => {
                let mut notices = Vec::new();
                if outcome.collection.is_empty() {
                    notices.push(Notice::Warning("No matching results for the selected join".into()));
                } else {
                    notices.push(Notice::Success(format!(
                        "Join complete, {} result rows",
                        outcome.rows()
                    )));
                }
                notices.extend(outcome.warnings.iter().cloned().map(Notice::Warning));
                self.result = Some(outcome);
                notices
            }
            Err(e) => {
                warn!("Join rejected: {}", e);
                vec![Notice::Error(e.to_string())]
            }
        }
    }

    pub fn result(&self) -> Option<&JoinOutcome> {
        self.result.as_ref()
    }

    // The current result as a download. Empty results are not offered.
    pub fn export(&self) -> Result<Option<ExportArtifact>, Notice> {
        match &self.result {
            Some(outcome) if !outcome.collection.is_empty() => export_artifact(&outcome.collection)
                .map(Some)
                .map_err(|e| Notice::Error(e.to_string())),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::{MergeHow, Predicate};

    const PARCELS: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]},"properties":{"key":"A"}},
        {"type":"Feature","geometry":{"type":"Polygon","coordinates":[[[2,0],[3,0],[3,1],[2,1],[2,0]]]},"properties":{"key":"B"}}
    ]}"#;
    const SHOPS: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","geometry":{"type":"Point","coordinates":[2.5,0.5]},"properties":{"key":"B","shop":"bakery"}}
    ]}"#;

    fn loaded() -> Session {
        let mut session = Session::default();
        assert!(!session.load(Side::Left, "parcels.geojson", PARCELS.as_bytes()).is_error());
        assert!(!session.load(Side::Right, "shops.geojson", SHOPS.as_bytes()).is_error());
        session
    }

    #[test]
    fn failed_load_names_the_file_and_keeps_other_side() {
        let mut session = loaded();
        let notice = session.load(Side::Right, "broken.zip", b"PK\x03");
        assert!(notice.is_error());
        assert!(notice.message().contains("broken.zip"));
        assert!(session.input(Side::Right).is_none());
        assert_eq!(session.input(Side::Left).map(|c| c.len()), Some(2));
    }

    #[test]
    fn join_requires_both_inputs() {
        let mut session = Session::default();
        session.load(Side::Left, "parcels.geojson", PARCELS.as_bytes());
        let notices = session.run_join(&JoinSpec::spatial(Predicate::Intersects));
        assert_eq!(notices, [Notice::Error("the right dataset has not been loaded".into())]);
        assert!(session.result().is_none());
    }

    #[test]
    fn result_is_replaced_by_each_join() {
        let mut session = loaded();
        let notices = session.run_join(&JoinSpec::spatial(Predicate::Intersects));
        assert!(matches!(notices[0], Notice::Success(_)));
        assert_eq!(session.result().unwrap().rows(), 2);

        let notices = session.run_join(&JoinSpec::attribute("key", "key", MergeHow::Inner));
        assert!(matches!(notices[0], Notice::Success(_)));
        assert_eq!(session.result().unwrap().rows(), 1);

        let artifact = session.export().unwrap().unwrap();
        assert_eq!(artifact.file_name, "spatial_join_result.geojson");
    }

    #[test]
    fn empty_result_is_a_warning_not_an_error() {
        let mut session = loaded();
        let notices = session.run_join(&JoinSpec::Spatial {
            predicate: Predicate::Within,
            how: crate::join::SpatialHow::Inner,
        });
        assert!(matches!(notices[0], Notice::Warning(_)));
        assert_eq!(session.result().unwrap().rows(), 0);
        assert_eq!(session.export(), Ok(None));
    }

    #[test]
    fn invalid_key_keeps_previous_result() {
        let mut session = loaded();
        session.run_join(&JoinSpec::spatial(Predicate::Intersects));
        let notices = session.run_join(&JoinSpec::attribute("key", "missing", MergeHow::Left));
        assert!(notices[0].is_error());
        assert!(notices[0].message().contains("missing"));
        assert_eq!(session.result().unwrap().rows(), 2);
    }

    #[test]
    fn right_merge_warns_about_missing_geometry() {
        let mut session = loaded();
        let extra = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":null,"properties":{"key":"Z"}}]}"#;
        session.load(Side::Right, "extra.geojson", extra.as_bytes());
        let notices = session.run_join(&JoinSpec::attribute("key", "key", MergeHow::Right));
        assert!(notices.iter().any(|n| matches!(n, Notice::Warning(m) if m.contains("no geometry"))));
        assert_eq!(session.result().unwrap().rows_without_geometry, 1);
    }

    #[test]
    fn previews_loaded_inputs() {
        let session = loaded();
        let preview = session.preview(Side::Left).unwrap();
        assert_eq!(preview.total_rows, 2);
        assert!(session.preview(Side::Right).is_some());
    }
}
