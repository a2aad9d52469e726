//! Insertion-ordered, id-keyed collections backing every entity the world owns.

use gacha_sim_core::{
    Category, CategoryId, Operation, OperationId, Prize, PrizeId, Rejection, Target, TargetId,
};

/// Entity stored inside a [`Repository`].
pub(crate) trait Record {
    /// Identifier type that keys the entity.
    type Id: PartialEq + Clone;

    /// Rejection reported when an id cannot be found.
    const MISSING: Rejection;

    /// Identifier of this entity.
    fn id(&self) -> &Self::Id;
}

impl Record for Prize {
    type Id = PrizeId;
    const MISSING: Rejection = Rejection::UnknownPrize;

    fn id(&self) -> &PrizeId {
        &self.id
    }
}

impl Record for Category {
    type Id = CategoryId;
    const MISSING: Rejection = Rejection::UnknownCategory;

    fn id(&self) -> &CategoryId {
        &self.id
    }
}

impl Record for Target {
    type Id = TargetId;
    const MISSING: Rejection = Rejection::UnknownTarget;

    fn id(&self) -> &TargetId {
        &self.id
    }
}

impl Record for Operation {
    type Id = OperationId;
    const MISSING: Rejection = Rejection::UnknownOperation;

    fn id(&self) -> &OperationId {
        Operation::id(self)
    }
}

/// Collection offering create, retrieve, update, and delete keyed by id.
#[derive(Clone, Debug)]
pub(crate) struct Repository<T> {
    entries: Vec<T>,
}

impl<T: Record> Repository<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Builds a repository from loaded entries, keeping the first entry for any
    /// repeated id. Returns the repository and the number of entries dropped.
    pub(crate) fn from_entries(entries: impl IntoIterator<Item = T>) -> (Self, usize) {
        let mut repository = Self::new();
        let mut dropped = 0;
        for entry in entries {
            if repository.create(entry).is_err() {
                dropped += 1;
            }
        }
        (repository, dropped)
    }

    pub(crate) fn create(&mut self, entry: T) -> Result<(), Rejection> {
        if self.contains(entry.id()) {
            return Err(Rejection::DuplicateId);
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Inserts an entry ahead of every existing one.
    pub(crate) fn create_first(&mut self, entry: T) -> Result<(), Rejection> {
        if self.contains(entry.id()) {
            return Err(Rejection::DuplicateId);
        }
        self.entries.insert(0, entry);
        Ok(())
    }

    pub(crate) fn retrieve(&self, id: &T::Id) -> Option<&T> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    pub(crate) fn retrieve_mut(&mut self, id: &T::Id) -> Option<&mut T> {
        self.entries.iter_mut().find(|entry| entry.id() == id)
    }

    /// Replaces the entry sharing the new value's id, returning the old value.
    pub(crate) fn update(&mut self, entry: T) -> Result<T, Rejection> {
        match self.retrieve_mut(entry.id()) {
            Some(slot) => Ok(std::mem::replace(slot, entry)),
            None => Err(T::MISSING),
        }
    }

    pub(crate) fn delete(&mut self, id: &T::Id) -> Result<T, Rejection> {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.id() == id)
            .ok_or(T::MISSING)?;
        Ok(self.entries.remove(position))
    }

    /// Removes every entry matching the predicate, returning them in order.
    pub(crate) fn delete_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Vec<T> {
        let (removed, kept): (Vec<T>, Vec<T>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| predicate(entry));
        self.entries = kept;
        removed
    }

    /// Removes every entry, returning how many were dropped.
    pub(crate) fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    pub(crate) fn contains(&self, id: &T::Id) -> bool {
        self.retrieve(id).is_some()
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.entries.iter_mut()
    }

    pub(crate) fn as_slice(&self) -> &[T] {
        &self.entries
    }

    pub(crate) fn first(&self) -> Option<&T> {
        self.entries.first()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
