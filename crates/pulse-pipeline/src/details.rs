//! Display attributes for related objects.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, instrument};

use pulse_core::field::{Detail, Field};
use pulse_core::models::{CrmObject, DealPipeline};
use pulse_core::{BatchChunker, Throttle};
use pulse_crm::CrmApi;

use crate::error::{PipelineError, PipelineResult};

// ─────────────────────────────────────────────────────────────────────────────
// Specs
// ─────────────────────────────────────────────────────────────────────────────

/// Which object type to read and which properties to show.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetailSpec {
    /// CRM object type (`deals`, `emails`).
    pub object_type: String,
    /// (property, placeholder when absent).
    pub fields: Vec<(String, &'static str)>,
}

impl DetailSpec {
    /// Deal name, stage, amount and close date.
    pub fn deals() -> Self {
        Self::new(
            "deals",
            &[
                ("dealname", "(no name)"),
                ("dealstage", "(no stage)"),
                ("amount", "(no amount)"),
                ("closedate", "(no close date)"),
            ],
        )
    }

    /// Email subject, direction and timestamp.
    pub fn emails() -> Self {
        Self::new(
            "emails",
            &[
                ("hs_email_subject", "(no subject)"),
                ("hs_email_direction", "(no direction)"),
                ("hs_timestamp", "(no date)"),
            ],
        )
    }

    fn new(object_type: &str, fields: &[(&str, &'static str)]) -> Self {
        Self {
            object_type: object_type.to_string(),
            fields: fields.iter().map(|(p, ph)| ((*p).to_string(), *ph)).collect(),
        }
    }

    /// Property names to request.
    pub fn properties(&self) -> Vec<String> {
        self.fields.iter().map(|(p, _)| p.clone()).collect()
    }

    /// Turn a batch-read object into a [`Detail::Known`] with placeholders filled.
    pub fn to_detail(&self, object: CrmObject) -> Detail {
        let CrmObject { id, mut properties } = object;
        let fields = self
            .fields
            .iter()
            .map(|(name, placeholder)| {
                let value = properties.remove(name).flatten();
                (name.clone(), Field::from_option(value, *placeholder))
            })
            .collect();
        Detail::Known { id, fields }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Enricher
// ─────────────────────────────────────────────────────────────────────────────

/// Batch-reads related objects, deduplicating ids first.
pub struct DetailEnricher<'a, A: CrmApi + ?Sized> {
    api: &'a A,
    chunker: BatchChunker,
}

impl<'a, A: CrmApi + ?Sized> DetailEnricher<'a, A> {
    /// Read in windows of `batch_size`, pausing `throttle` after each.
    pub fn new(api: &'a A, batch_size: usize, throttle: Throttle) -> Self {
        Self {
            api,
            chunker: BatchChunker::new(batch_size, throttle),
        }
    }

    /// Details for every id in `ids`. Ids the CRM never returns map to
    /// [`Detail::Unknown`]; a failed window is fatal.
    #[instrument(skip_all, fields(object_type = %spec.object_type, candidates = ids.len()))]
    pub async fn fetch(
        &self,
        spec: &DetailSpec,
        ids: &[String],
    ) -> PipelineResult<BTreeMap<String, Detail>> {
        let unique = dedup(ids);
        let api = self.api;
        let object_type = spec.object_type.as_str();
        let properties = spec.properties();
        let properties = properties.as_slice();

        let mut returned = self
            .chunker
            .run(
                &unique,
                HashMap::new(),
                |window: Vec<String>| async move {
                    api.batch_read_objects(object_type, &window, properties).await
                },
                |acc: &mut HashMap<String, CrmObject>, objects: Vec<CrmObject>| {
                    for object in objects {
                        let _ = acc.insert(object.id.clone(), object);
                    }
                },
            )
            .await
            .map_err(|source| PipelineError::Detail {
                object_type: spec.object_type.clone(),
                source,
            })?;

        let details: BTreeMap<String, Detail> = unique
            .into_iter()
            .map(|id| {
                let detail = match returned.remove(&id) {
                    Some(object) => spec.to_detail(object),
                    None => Detail::Unknown { id: id.clone() },
                };
                (id, detail)
            })
            .collect();
        debug!(
            requested = details.len(),
            unknown = details.values().filter(|d| !d.is_known()).count(),
            "details fetched"
        );
        Ok(details)
    }
}

/// Order-preserving dedup.
fn dedup(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Stage labels
// ─────────────────────────────────────────────────────────────────────────────

/// Deal stage id → label, built once per run.
#[derive(Clone, Debug, Default)]
pub struct StageLabels {
    labels: HashMap<String, String>,
}

impl StageLabels {
    /// Index every stage of every pipeline.
    pub fn from_pipelines(pipelines: &[DealPipeline]) -> Self {
        let labels = pipelines
            .iter()
            .flat_map(|p| p.stages.iter().cloned())
            .collect();
        Self { labels }
    }

    /// Fetch pipelines and index their stages.
    pub async fn load<A: CrmApi + ?Sized>(api: &A, throttle: Throttle) -> PipelineResult<Self> {
        let result = api.deal_pipelines().await;
        throttle.wait().await;
        let labels = Self::from_pipelines(&result?);
        debug!(stages = labels.len(), "deal stage labels loaded");
        Ok(labels)
    }

    /// Label for `stage_id`, or the raw id when unknown.
    pub fn label<'s>(&'s self, stage_id: &'s str) -> &'s str {
        self.labels.get(stage_id).map_or(stage_id, String::as_str)
    }

    /// Number of known stages.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether no stages are known.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pulse_crm::{MockCall, MockCrm};

    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn shared_ids_fetched_once() {
        let api = MockCrm::new().with_object("deals", "d1", &[("dealname", Some("Acme"))]);
        let enricher = DetailEnricher::new(&api, 100, Throttle::disabled());
        let details = enricher
            .fetch(&DetailSpec::deals(), &ids(&["d1", "d2", "d1"]))
            .await
            .unwrap();

        assert_eq!(details.len(), 2);
        let reads = api.calls();
        assert_eq!(
            reads,
            vec![MockCall::BatchRead {
                object_type: "deals".into(),
                ids: ids(&["d1", "d2"]),
            }]
        );
    }

    #[tokio::test]
    async fn missing_objects_become_unknown() {
        let api = MockCrm::new().with_object(
            "deals",
            "d1",
            &[("dealname", Some("Acme")), ("dealstage", Some("closedwon"))],
        );
        let enricher = DetailEnricher::new(&api, 100, Throttle::disabled());
        let details = enricher
            .fetch(&DetailSpec::deals(), &ids(&["d1", "d2"]))
            .await
            .unwrap();

        let d1 = &details["d1"];
        assert!(d1.is_known());
        assert_eq!(d1.field("dealname"), Field::Present("Acme".into()));
        assert_eq!(d1.field("amount"), Field::Absent("(no amount)"));

        let d2 = &details["d2"];
        assert!(!d2.is_known());
        assert_eq!(d2.field("dealname").display(), "(unknown)");
    }

    #[tokio::test]
    async fn null_property_gets_placeholder_but_empty_string_is_kept() {
        let api = MockCrm::new().with_object(
            "emails",
            "e1",
            &[("hs_email_subject", Some("")), ("hs_timestamp", None)],
        );
        let enricher = DetailEnricher::new(&api, 100, Throttle::disabled());
        let details = enricher
            .fetch(&DetailSpec::emails(), &ids(&["e1"]))
            .await
            .unwrap();
        let e1 = &details["e1"];
        assert_eq!(e1.field("hs_email_subject"), Field::Present(String::new()));
        assert_eq!(e1.field("hs_timestamp"), Field::Absent("(no date)"));
    }

    #[tokio::test]
    async fn empty_candidates_make_no_calls() {
        let api = MockCrm::new();
        let enricher = DetailEnricher::new(&api, 100, Throttle::disabled());
        let details = enricher.fetch(&DetailSpec::deals(), &[]).await.unwrap();
        assert!(details.is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn windows_respect_batch_size() {
        let api = MockCrm::new();
        let enricher = DetailEnricher::new(&api, 2, Throttle::disabled());
        let _ = enricher
            .fetch(&DetailSpec::emails(), &ids(&["a", "b", "c"]))
            .await
            .unwrap();
        assert_eq!(api.count_calls(|c| matches!(c, MockCall::BatchRead { .. })), 2);
    }

    #[test]
    fn stage_label_falls_back_to_raw_id() {
        let labels = StageLabels::from_pipelines(&[DealPipeline {
            id: "default".into(),
            label: "Sales".into(),
            stages: vec![("closedwon".into(), "Closed Won".into())],
        }]);
        assert_eq!(labels.label("closedwon"), "Closed Won");
        assert_eq!(labels.label("custom-42"), "custom-42");
        assert_eq!(labels.len(), 1);
    }

    #[tokio::test]
    async fn stage_labels_load_from_api() {
        let api = MockCrm::new().with_pipeline(DealPipeline {
            id: "default".into(),
            label: "Sales".into(),
            stages: vec![
                ("appointmentscheduled".into(), "Appointment".into()),
                ("closedwon".into(), "Closed Won".into()),
            ],
        });
        let labels = StageLabels::load(&api, Throttle::disabled()).await.unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(api.calls(), vec![MockCall::DealPipelines]);
    }
}
