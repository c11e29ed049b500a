use crate::error::CatalogueError;
use crate::text::{compact, find_phrase, normalize, split_camel};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Minimum skim score for an informal step name to resolve to a catalogue step.
const FUZZY_THRESHOLD: i64 = 50;

/// A verbal cue that suggests a step is about to start, e.g. asking for the clip applier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCue {
    pub phrase: String,
    /// Spoken after "Observing ..." when the cue is used to propose the step.
    pub observation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureStep {
    pub key: String,
    pub name: String,
    pub min_seconds: u64,
    pub max_seconds: u64,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub cues: Vec<StepCue>,
}

impl ProcedureStep {
    pub fn new(key: &str, name: &str, min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            min_seconds,
            max_seconds,
            aliases: Vec::new(),
            cues: Vec::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases.extend(aliases.iter().map(|a| a.to_string()));
        self
    }

    pub fn with_cue(mut self, phrase: &str, observation: &str) -> Self {
        self.cues.push(StepCue {
            phrase: phrase.to_string(),
            observation: observation.to_string(),
        });
        self
    }

    /// Expected duration used for thresholds: the top of the range.
    pub fn estimated_seconds(&self) -> u64 {
        self.max_seconds
    }

    pub fn halfway(&self) -> u64 {
        self.estimated_seconds() / 2
    }

    /// Elapsed seconds after which the attending is asked for a progress read.
    pub fn checkin_threshold(&self) -> u64 {
        self.estimated_seconds() * 3 / 4
    }

    /// The first cue of this step heard in an already-normalized utterance.
    pub fn cue_in(&self, normalized: &str) -> Option<&StepCue> {
        self.cues
            .iter()
            .filter_map(|cue| find_phrase(normalized, &cue.phrase).map(|pos| (pos, cue)))
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, cue)| cue)
    }

    /// Earliest position at which this step is named in an already-normalized utterance.
    fn named_at(&self, normalized: &str) -> Option<usize> {
        std::iter::once(self.name.clone())
            .chain(std::iter::once(split_camel(&self.key)))
            .chain(self.aliases.iter().cloned())
            .filter_map(|phrase| find_phrase(normalized, &phrase))
            .min()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Procedure {
    pub id: String,
    pub name: String,
    pub steps: Vec<ProcedureStep>,
    #[serde(default)]
    pub difficulty_rubric: BTreeMap<u8, String>,
}

impl Procedure {
    pub fn new(
        id: &str,
        name: &str,
        steps: Vec<ProcedureStep>,
        difficulty_rubric: BTreeMap<u8, String>,
    ) -> Result<Self, CatalogueError> {
        let procedure = Self {
            id: id.to_string(),
            name: name.to_string(),
            steps,
            difficulty_rubric,
        };
        procedure.validate()?;
        Ok(procedure)
    }

    /// Checks the ordering invariants: non-empty, unique keys, sane duration ranges.
    pub fn validate(&self) -> Result<(), CatalogueError> {
        if self.steps.is_empty() {
            return Err(CatalogueError::EmptyProcedure(self.id.clone()));
        }
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.key.as_str()) {
                return Err(CatalogueError::DuplicateStep {
                    procedure: self.id.clone(),
                    key: step.key.clone(),
                });
            }
            if step.min_seconds > step.max_seconds {
                return Err(CatalogueError::InvalidDuration {
                    procedure: self.id.clone(),
                    key: step.key.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn step(&self, key: &str) -> Option<&ProcedureStep> {
        self.steps.iter().find(|s| s.key == key)
    }

    pub fn step_name(&self, key: &str) -> Option<&str> {
        self.step(key).map(|s| s.name.as_str())
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.key == key)
    }

    pub fn first_step(&self) -> Option<&ProcedureStep> {
        self.steps.first()
    }

    /// The step following `key` in clinical order, if any.
    pub fn next_step(&self, key: &str) -> Option<&ProcedureStep> {
        self.index_of(key).and_then(|i| self.steps.get(i + 1))
    }

    /// Resolves an informal or partial step name (as a model or a surgeon might say it).
    ///
    /// Tries, in order: the exact key, key/name/alias equality ignoring case and
    /// punctuation, a unique substring match on the name, then the best skim
    /// fuzzy score above a fixed threshold. Returns `None` rather than guessing.
    pub fn resolve_step(&self, query: &str) -> Option<&ProcedureStep> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        if let Some(step) = self.step(query) {
            return Some(step);
        }

        let wanted = compact(query);
        if let Some(step) = self.steps.iter().find(|s| {
            compact(&s.key) == wanted
                || compact(&s.name) == wanted
                || s.aliases.iter().any(|a| compact(a) == wanted)
        }) {
            return Some(step);
        }

        let normalized = normalize(query);
        let containing: Vec<&ProcedureStep> = self
            .steps
            .iter()
            .filter(|s| {
                let name = normalize(&s.name);
                name.contains(&normalized) || normalized.contains(&name)
            })
            .collect();
        if let [only] = containing.as_slice() {
            return Some(*only);
        }

        let matcher = SkimMatcherV2::default();
        self.steps
            .iter()
            .filter_map(|s| {
                let score = std::iter::once(s.name.as_str())
                    .chain(s.aliases.iter().map(String::as_str))
                    .filter_map(|candidate| {
                        matcher.fuzzy_match(&candidate.to_lowercase(), &normalized)
                    })
                    .max()?;
                (score >= FUZZY_THRESHOLD).then_some((score, s))
            })
            .max_by_key(|(score, _)| *score)
            .map(|(_, s)| s)
    }

    /// Steps named in an utterance, ordered by where they are first mentioned.
    pub fn mentions(&self, utterance: &str) -> Vec<&ProcedureStep> {
        let normalized = normalize(utterance);
        let mut found: Vec<(usize, &ProcedureStep)> = self
            .steps
            .iter()
            .filter_map(|s| s.named_at(&normalized).map(|pos| (pos, s)))
            .collect();
        found.sort_by_key(|(pos, _)| *pos);
        found.into_iter().map(|(_, s)| s).collect()
    }

    /// Ordered step list as rendered into prompts: `1. portPlacement: Port Placement (5-10 min)`.
    pub fn step_outline(&self) -> String {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, s)| {
                format!(
                    "{}. {}: {} ({}-{} min)",
                    i + 1,
                    s.key,
                    s.name,
                    s.min_seconds / 60,
                    s.max_seconds / 60
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Read-only source of procedure reference data.
///
/// Sessions receive a catalogue rather than reaching for a global so tests can
/// substitute fixtures.
pub trait ProcedureCatalogue: Send + Sync {
    fn get_procedure(&self, id: &str) -> Result<&Procedure, CatalogueError>;

    fn procedure_ids(&self) -> Vec<&str>;
}

/// In-memory catalogue, either the built-in reference data or loaded from JSON.
#[derive(Debug, Clone)]
pub struct StaticCatalogue {
    procedures: BTreeMap<String, Procedure>,
}

impl StaticCatalogue {
    pub fn new(procedures: Vec<Procedure>) -> Result<Self, CatalogueError> {
        let mut map = BTreeMap::new();
        for procedure in procedures {
            procedure.validate()?;
            if map.contains_key(&procedure.id) {
                return Err(CatalogueError::DuplicateProcedure(procedure.id));
            }
            map.insert(procedure.id.clone(), procedure);
        }
        Ok(Self { procedures: map })
    }

    /// The catalogue shipped with the assistant.
    pub fn builtin() -> Self {
        let procedures = crate::procedures::builtin_procedures()
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        Self { procedures }
    }

    /// Parses a JSON array of procedures.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogueError> {
        let procedures: Vec<Procedure> = serde_json::from_str(json)?;
        Self::new(procedures)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogueError> {
        let json = std::fs::read_to_string(path).map_err(|source| CatalogueError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalogue = Self::from_json_str(&json)?;
        tracing::info!(
            "Loaded {} procedures from {}",
            catalogue.procedures.len(),
            path.display()
        );
        Ok(catalogue)
    }
}

impl ProcedureCatalogue for StaticCatalogue {
    fn get_procedure(&self, id: &str) -> Result<&Procedure, CatalogueError> {
        self.procedures
            .get(id)
            .ok_or_else(|| CatalogueError::NotFound(id.to_string()))
    }

    fn procedure_ids(&self) -> Vec<&str> {
        self.procedures.keys().map(String::as_str).collect()
    }
}
