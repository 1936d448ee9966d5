use std::collections::HashMap;

use crate::enemy::EnemyArchetype;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnemyDefId(pub u32);

#[derive(Debug, Clone)]
pub struct EnemyDef {
    pub id: EnemyDefId,
    /// Mod the winning definition came from.
    pub mod_id: String,
    pub archetype: EnemyArchetype,
}

impl EnemyDef {
    pub fn def_name(&self) -> &str {
        &self.archetype.def_name
    }
}

/// Compiled enemy defs. Ids follow sorted defName order, so they are stable
/// for a given set of names regardless of file or mod order.
#[derive(Debug, Default, Clone)]
pub struct DefDatabase {
    enemy_defs: Vec<EnemyDef>,
    enemy_ids_by_name: HashMap<String, EnemyDefId>,
}

impl DefDatabase {
    pub(crate) fn from_enemy_defs(mut enemy_defs: Vec<EnemyDef>) -> Self {
        enemy_defs.sort_by(|a, b| a.archetype.def_name.cmp(&b.archetype.def_name));
        let mut enemy_ids_by_name = HashMap::with_capacity(enemy_defs.len());
        for (idx, def) in enemy_defs.iter_mut().enumerate() {
            let id = EnemyDefId(idx as u32);
            def.id = id;
            enemy_ids_by_name.insert(def.archetype.def_name.clone(), id);
        }
        Self {
            enemy_defs,
            enemy_ids_by_name,
        }
    }

    pub fn enemy_def_id_by_name(&self, name: &str) -> Option<EnemyDefId> {
        self.enemy_ids_by_name.get(name).copied()
    }

    pub fn enemy_def(&self, id: EnemyDefId) -> Option<&EnemyDef> {
        self.enemy_defs.get(id.0 as usize)
    }

    pub fn enemy_archetype_by_name(&self, name: &str) -> Option<&EnemyArchetype> {
        self.enemy_def_id_by_name(name)
            .and_then(|id| self.enemy_def(id))
            .map(|def| &def.archetype)
    }

    pub fn enemy_defs(&self) -> &[EnemyDef] {
        &self.enemy_defs
    }

    pub fn len(&self) -> usize {
        self.enemy_defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enemy_defs.is_empty()
    }
}
