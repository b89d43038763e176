//! Debate personas: fixed model, temperature and role prompt per agent.

use serde::{Deserialize, Serialize};

/// Token cap for every persona reply.
pub const PERSONA_MAX_TOKENS: u32 = 400;

/// One LLM-backed participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub role_prompt: String,
}

impl Persona {
    pub fn new(id: &str, model: &str, temperature: f32, role_prompt: &str) -> Self {
        Self {
            id: id.to_string(),
            model: model.to_string(),
            temperature,
            max_tokens: PERSONA_MAX_TOKENS,
            role_prompt: role_prompt.to_string(),
        }
    }
}

/// The set of personas a debate can draw from, in canonical order.
#[derive(Debug, Clone)]
pub struct Roster {
    personas: Vec<Persona>,
}

impl Default for Roster {
    fn default() -> Self {
        Self::new(vec![
            Persona::new(
                "architect",
                "gpt-4o",
                0.3,
                "You are @architect. Think long-term: scalability and what breaks at scale. \
                 Speak as in a design review, direct and opinionated. \
                 Reference @pragmatist and @critic by name and agree or disagree sharply.",
            ),
            Persona::new(
                "pragmatist",
                "gpt-4o",
                0.5,
                "You are @pragmatist. Ship fast, iterate, cut scope. \
                 Speak as in a design review, direct and opinionated. \
                 Reference @architect and @critic by name and push back on overengineering.",
            ),
            Persona::new(
                "critic",
                "gpt-4o-mini",
                0.4,
                "You are @critic. Find edge cases, failure modes and security holes. \
                 Speak as in a design review, direct and opinionated. \
                 Reference @architect and @pragmatist by name and challenge assumptions.",
            ),
        ])
    }
}

impl Roster {
    pub fn new(personas: Vec<Persona>) -> Self {
        Self { personas }
    }

    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }

    pub fn all(&self) -> &[Persona] {
        &self.personas
    }

    pub fn ids(&self) -> Vec<&str> {
        self.personas.iter().map(|p| p.id.as_str()).collect()
    }

    /// Resolve requested ids in request order, dropping unknown and repeated ids.
    ///
    /// `None` or an empty request selects the whole roster.
    pub fn select(&self, requested: Option<&[String]>) -> Selection<'_> {
        let Some(requested) = requested.filter(|r| !r.is_empty()) else {
            return Selection {
                personas: self.personas.iter().collect(),
                unknown: Vec::new(),
            };
        };

        let mut selection = Selection {
            personas: Vec::new(),
            unknown: Vec::new(),
        };
        for id in requested {
            let id = id.trim().trim_start_matches('@');
            match self.get(id) {
                Some(p) if !selection.personas.iter().any(|s| s.id == p.id) => {
                    selection.personas.push(p)
                }
                Some(_) => {}
                None => selection.unknown.push(id.to_string()),
            }
        }
        selection
    }
}

/// Result of [`Roster::select`].
#[derive(Debug)]
pub struct Selection<'a> {
    pub personas: Vec<&'a Persona>,
    pub unknown: Vec<String>,
}
