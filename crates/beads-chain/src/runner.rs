use beads_query::get_path;
use beads_store::{Collection, Store};
use bson::{Bson, Document};
use tracing::{debug, info, warn};

use crate::chunks::{Chunks, chunks};
use crate::counters::{Counters, IN, OUT};
use crate::error::ChainError;
use crate::lookup::lookup;
use crate::spec::{ChainSpec, Cutoff, JoinSpec, Predicate};

/// Starts lookup chains against a store.
///
/// All run state lives in the returned [`Lookups`], so one runner can drive
/// any number of independent runs.
pub struct ChainRunner<'s, S: Store> {
    store: &'s S,
}

impl<'s, S: Store> ChainRunner<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Resolve every collection in `spec`, open the primary cursor and
    /// return the run as an iterator of enriched output batches.
    pub fn lookups(&self, spec: &ChainSpec) -> Result<Lookups<S::Collection>, ChainError> {
        let primary = self.open(spec.collection())?;
        let stages = spec
            .stages()
            .iter()
            .map(|join| {
                Ok(Stage {
                    collection: self.open(&join.collection)?,
                    join: join.clone(),
                })
            })
            .collect::<Result<Vec<_>, ChainError>>()?;
        let cutoff = spec
            .cutoff()
            .filter(|c| c.minutes > 0)
            .map(|c| CutoffFilter::starting_at(c, bson::DateTime::now()));
        let source = chunks(&primary, spec.query())?;

        info!(
            collection = spec.collection(),
            stages = stages.len(),
            cutoff = cutoff.is_some(),
            "lookup chain started"
        );
        Ok(Lookups {
            source: Some(source),
            primary: spec.collection().to_string(),
            predicate: spec.predicate().cloned(),
            stages,
            cutoff,
            counts: Counters::for_chain(spec),
            output: Vec::new(),
            output_size: spec.output_size(),
            state: RunState::Streaming,
        })
    }

    fn open(&self, name: &str) -> Result<S::Collection, ChainError> {
        self.store
            .collection(name)
            .map_err(|e| ChainError::query(name, e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Streaming,
    Done,
    Failed,
}

struct Stage<C> {
    collection: C,
    join: JoinSpec,
}

/// Documents are kept only when `field` is strictly newer than the
/// threshold. Numbers are epoch seconds, datetimes are compared directly,
/// anything else is dropped.
#[derive(Debug, Clone)]
struct CutoffFilter {
    field: String,
    threshold_ms: i64,
}

impl CutoffFilter {
    fn starting_at(cutoff: &Cutoff, now: bson::DateTime) -> Self {
        let window_ms = i64::try_from(cutoff.minutes)
            .unwrap_or(i64::MAX)
            .saturating_mul(60_000);
        Self {
            field: cutoff.field.clone(),
            threshold_ms: now.timestamp_millis().saturating_sub(window_ms),
        }
    }

    fn keeps(&self, doc: &Document) -> bool {
        match get_path(doc, &self.field) {
            Some(Bson::Int32(secs)) => (*secs as i64).saturating_mul(1000) > self.threshold_ms,
            Some(Bson::Int64(secs)) => secs.saturating_mul(1000) > self.threshold_ms,
            Some(Bson::Double(secs)) => secs * 1000.0 > self.threshold_ms as f64,
            Some(Bson::DateTime(dt)) => dt.timestamp_millis() > self.threshold_ms,
            _ => false,
        }
    }
}

enum Flow {
    Continue,
    Stop,
}

/// One lookup chain run.
///
/// Each call to `next` pulls source batches until an output batch of the
/// configured size is ready. The first error is yielded once and ends the
/// run. Dropping the iterator releases the store cursor.
pub struct Lookups<C: Collection> {
    source: Option<Chunks<C::Cursor>>,
    primary: String,
    predicate: Option<Predicate>,
    stages: Vec<Stage<C>>,
    cutoff: Option<CutoffFilter>,
    counts: Counters,
    output: Vec<Document>,
    output_size: usize,
    state: RunState,
}

impl<C: Collection> Lookups<C> {
    /// Counters so far; final once the iterator is exhausted.
    pub fn counts(&self) -> &Counters {
        &self.counts
    }

    pub fn into_counts(self) -> Counters {
        self.counts
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn process(&mut self, mut docs: Vec<Document>) -> Result<Flow, ChainError> {
        self.counts.add(IN, docs.len());

        if let Some(cutoff) = &self.cutoff {
            docs.retain(|d| cutoff.keeps(d));
            if docs.is_empty() {
                return Ok(Flow::Stop);
            }
        }

        if let Some(predicate) = &self.predicate {
            docs.retain(|d| predicate.test(d));
        }
        self.counts.add(&self.primary, docs.len());

        for stage in &self.stages {
            let join = &stage.join;
            lookup(&stage.collection, &mut docs, &join.key, &join.options)?;
            if let Some(predicate) = &join.predicate {
                docs.retain(|d| predicate.test(d));
            }
            self.counts.add(&join.collection, docs.len());
        }

        self.counts.add(OUT, docs.len());
        self.output.extend(docs);
        Ok(Flow::Continue)
    }

    fn finish(&mut self) {
        self.source = None;
        self.state = RunState::Done;
        info!(counts = %self.counts, "lookup chain finished");
    }

    fn fail(&mut self, error: ChainError) -> ChainError {
        self.source = None;
        self.output.clear();
        self.state = RunState::Failed;
        warn!(counts = %self.counts, %error, "lookup chain failed");
        error
    }
}

impl<C: Collection> Iterator for Lookups<C> {
    type Item = Result<Vec<Document>, ChainError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.output.len() >= self.output_size {
                let rest = self.output.split_off(self.output_size);
                return Some(Ok(std::mem::replace(&mut self.output, rest)));
            }
            match self.state {
                RunState::Failed => return None,
                RunState::Done => {
                    if self.output.is_empty() {
                        return None;
                    }
                    return Some(Ok(std::mem::take(&mut self.output)));
                }
                RunState::Streaming => {}
            }

            let batch = match self.source.as_mut().and_then(|s| s.next()) {
                None => {
                    self.finish();
                    continue;
                }
                Some(Err(e)) => return Some(Err(self.fail(e))),
                Some(Ok(batch)) => batch,
            };
            match self.process(batch) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => {
                    debug!(collection = %self.primary, "cutoff reached");
                    self.finish();
                }
                Err(e) => return Some(Err(self.fail(e))),
            }
        }
    }
}
