//! # Rules
//!
//! Entity type definitions: which traits an entity of a given type is
//! built from, in which order, and with which render bounds.
//!
//! A [`TraitInfo`] is a factory. It may name other traits it requires;
//! registration resolves those into a construction order once, so
//! creating an entity never has to sort anything.
//!
//! ## Construction order
//!
//! Stable topological order of the declared list: a trait comes after
//! everything it requires, and otherwise keeps its declared position.
//! Missing requirements and cycles are rejected at registration.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use phalanx_shared::{CPos, Size, WPos, EDITOR_WORLD_ENTITY_TYPE, WORLD_ENTITY_TYPE};

use crate::entity::EntityId;
use crate::error::{KernelError, KernelResult};
use crate::player::PlayerId;
use crate::traits::Trait;

// =============================================================================
// INIT DATA
// =============================================================================

/// A named construction parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitValue {
    /// Integer.
    Int(i64),
    /// Flag.
    Bool(bool),
    /// Text.
    Text(String),
    /// Cell.
    Cell(CPos),
    /// World position.
    Position(WPos),
    /// Another entity.
    Entity(EntityId),
}

/// Per-instance construction data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityInit {
    /// Owning player.
    pub owner: Option<PlayerId>,
    /// Cell the entity starts in.
    pub location: Option<CPos>,
    /// Exact starting position. Wins over `location`.
    pub center_position: Option<WPos>,
    values: BTreeMap<String, InitValue>,
}

impl EntityInit {
    /// Empty init data.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the owner.
    #[must_use]
    pub fn owner(mut self, owner: PlayerId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Sets the starting cell.
    #[must_use]
    pub fn location(mut self, cell: CPos) -> Self {
        self.location = Some(cell);
        self
    }

    /// Sets the exact starting position.
    #[must_use]
    pub fn center_position(mut self, position: WPos) -> Self {
        self.center_position = Some(position);
        self
    }

    /// Adds a named value.
    #[must_use]
    pub fn value(mut self, name: impl Into<String>, value: InitValue) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Looks up a named value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&InitValue> {
        self.values.get(name)
    }

    /// Looks up a named integer.
    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.values.get(name)? {
            InitValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Starting centre: explicit position, else the centre of the starting
    /// cell, else the origin.
    #[must_use]
    pub fn resolved_center(&self) -> WPos {
        self.center_position
            .or_else(|| self.location.map(CPos::center))
            .unwrap_or(WPos::ZERO)
    }
}

// =============================================================================
// TRAIT INFO
// =============================================================================

/// Builds a trait instance from init data.
pub type TraitFactory = Arc<dyn Fn(&EntityInit) -> Box<dyn Trait> + Send + Sync>;

/// Definition of one trait of an entity type.
#[derive(Clone)]
pub struct TraitInfo {
    name: &'static str,
    requires: Vec<&'static str>,
    factory: TraitFactory,
}

impl TraitInfo {
    /// Trait definition named `name`, built by `factory`.
    pub fn new<F>(name: &'static str, factory: F) -> Self
    where
        F: Fn(&EntityInit) -> Box<dyn Trait> + Send + Sync + 'static,
    {
        Self {
            name,
            requires: Vec::new(),
            factory: Arc::new(factory),
        }
    }

    /// Declares that this trait must be constructed after `other`.
    #[must_use]
    pub fn requires(mut self, other: &'static str) -> Self {
        self.requires.push(other);
        self
    }

    /// Trait name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Names of required traits.
    #[must_use]
    pub fn requirements(&self) -> &[&'static str] {
        &self.requires
    }

    /// Builds an instance.
    #[must_use]
    pub fn create(&self, init: &EntityInit) -> Box<dyn Trait> {
        (self.factory)(init)
    }
}

impl fmt::Debug for TraitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraitInfo")
            .field("name", &self.name)
            .field("requires", &self.requires)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ENTITY INFO
// =============================================================================

/// Definition of an entity type.
#[derive(Clone, Debug)]
pub struct EntityInfo {
    name: String,
    traits: Vec<TraitInfo>,
    render_size: Size,
    selection_priority: i32,
}

impl EntityInfo {
    /// Type with no traits and no render bounds.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            traits: Vec::new(),
            render_size: Size::EMPTY,
            selection_priority: 0,
        }
    }

    /// Appends a trait to the declared list.
    #[must_use]
    pub fn with_trait(mut self, info: TraitInfo) -> Self {
        self.traits.push(info);
        self
    }

    /// Sets the render bounds size in screen pixels.
    #[must_use]
    pub fn render_size(mut self, size: Size) -> Self {
        self.render_size = size;
        self
    }

    /// Sets the hit-test priority.
    #[must_use]
    pub fn selection_priority(mut self, priority: i32) -> Self {
        self.selection_priority = priority;
        self
    }

    /// Type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Traits in construction order (after registration).
    #[must_use]
    pub fn traits(&self) -> &[TraitInfo] {
        &self.traits
    }

    /// Render bounds size.
    #[must_use]
    pub const fn size(&self) -> Size {
        self.render_size
    }

    /// Hit-test priority.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.selection_priority
    }

    /// Reorders `traits` into construction order.
    fn resolve_order(&mut self) -> KernelResult<()> {
        let count = self.traits.len();
        let mut deps: Vec<Vec<usize>> = Vec::with_capacity(count);
        for info in &self.traits {
            let mut of_this = Vec::with_capacity(info.requires.len());
            for required in &info.requires {
                let Some(at) = self.traits.iter().position(|t| t.name == *required) else {
                    return Err(KernelError::MissingTraitDependency {
                        entity_type: self.name.clone(),
                        trait_name: info.name.to_string(),
                        requires: (*required).to_string(),
                    });
                };
                of_this.push(at);
            }
            deps.push(of_this);
        }

        // Kahn's algorithm, always taking the earliest declared ready trait.
        let mut placed = vec![false; count];
        let mut order = Vec::with_capacity(count);
        while order.len() < count {
            let next = (0..count).find(|&i| !placed[i] && deps[i].iter().all(|&d| placed[d]));
            let Some(next) = next else {
                return Err(KernelError::TraitDependencyCycle {
                    entity_type: self.name.clone(),
                });
            };
            placed[next] = true;
            order.push(next);
        }

        let mut slots: Vec<Option<TraitInfo>> = std::mem::take(&mut self.traits).into_iter().map(Some).collect();
        self.traits = order.into_iter().filter_map(|i| slots[i].take()).collect();
        Ok(())
    }
}

// =============================================================================
// RULESET
// =============================================================================

/// All entity type definitions of a session.
#[derive(Clone, Debug)]
pub struct Ruleset {
    entities: BTreeMap<String, EntityInfo>,
}

impl Default for Ruleset {
    fn default() -> Self {
        Self::new()
    }
}

impl Ruleset {
    /// Ruleset holding bare `World` and `EditorWorld` types. Register a
    /// type of the same name to replace them.
    #[must_use]
    pub fn new() -> Self {
        let mut entities = BTreeMap::new();
        for name in [WORLD_ENTITY_TYPE, EDITOR_WORLD_ENTITY_TYPE] {
            entities.insert(name.to_string(), EntityInfo::new(name));
        }
        Self { entities }
    }

    /// Adds or replaces a type definition.
    ///
    /// # Errors
    ///
    /// `MissingTraitDependency` or `TraitDependencyCycle` if the trait
    /// requirements cannot be satisfied.
    pub fn register(&mut self, mut info: EntityInfo) -> KernelResult<()> {
        info.resolve_order()?;
        self.entities.insert(info.name.clone(), info);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    ///
    /// # Errors
    ///
    /// As [`register`](Self::register).
    pub fn with(mut self, info: EntityInfo) -> KernelResult<Self> {
        self.register(info)?;
        Ok(self)
    }

    /// Looks up a type.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EntityInfo> {
        self.entities.get(name)
    }

    /// Whether a type is defined.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Type names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entities.keys().map(String::as_str)
    }
}
