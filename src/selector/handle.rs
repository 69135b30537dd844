//! Read/write view over a single annotation's ordered value list.
//!
//! Values are addressed by logical key. The view caches the resolved
//! position of each key together with the generation of the value list it
//! was resolved against; removing a pair splices the list and bumps the
//! generation, so every handle obtained earlier is rejected instead of
//! silently pointing at a shifted neighbour.

use crate::bytecode::{AnnotationNode, AnnotationValue};
use crate::selector::errors::AnnotationError;
use crate::selector::kind::AnnotationKind;
use std::cell::RefCell;
use std::collections::HashMap;

/// Position of a key's value inside the parent annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueHandle {
    key: String,
    index: usize,
    generation: u32,
}

impl ValueHandle {
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    index: usize,
    generation: u32,
}

pub struct AnnotationView<'a> {
    node: &'a mut AnnotationNode,
    generation: u32,
    cache: RefCell<HashMap<String, Slot>>,
}

impl<'a> AnnotationView<'a> {
    pub fn new(node: &'a mut AnnotationNode) -> Self {
        Self {
            node,
            generation: 0,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn desc(&self) -> &str {
        &self.node.desc
    }

    pub fn kind(&self) -> Option<AnnotationKind> {
        AnnotationKind::from_descriptor(&self.node.desc)
    }

    pub fn node(&self) -> &AnnotationNode {
        self.node
    }

    /// Resolve `key` to a handle, reusing the cached position when it is
    /// still from the current generation.
    pub fn get(&self, key: &str) -> Option<ValueHandle> {
        let mut cache = self.cache.borrow_mut();
        if let Some(slot) = cache.get(key) {
            if slot.generation == self.generation {
                return Some(self.handle(key, slot.index));
            }
        }
        let index = self.node.position(key)?;
        cache.insert(
            key.to_string(),
            Slot {
                index,
                generation: self.generation,
            },
        );
        Some(self.handle(key, index))
    }

    fn handle(&self, key: &str, index: usize) -> ValueHandle {
        ValueHandle {
            key: key.to_string(),
            index,
            generation: self.generation,
        }
    }

    pub fn value(&self, key: &str) -> Option<&AnnotationValue> {
        let handle = self.get(key)?;
        Some(&self.node.values[handle.index].1)
    }

    pub fn get_int(&self, key: &str) -> Option<i32> {
        self.value(key).and_then(AnnotationValue::as_int)
    }

    pub fn read(&self, handle: &ValueHandle) -> Result<&AnnotationValue, AnnotationError> {
        self.check(handle)?;
        Ok(&self.node.values[handle.index].1)
    }

    pub fn read_int(&self, handle: &ValueHandle) -> Result<i32, AnnotationError> {
        let value = self.read(handle)?;
        value.as_int().ok_or_else(|| AnnotationError::TypeMismatch {
            key: handle.key.clone(),
            expected: "int",
            found: value.kind_name(),
        })
    }

    /// Overwrite the value a handle points at. Visible to every holder of a
    /// handle for the same key.
    pub fn write(
        &mut self,
        handle: &ValueHandle,
        value: impl Into<AnnotationValue>,
    ) -> Result<(), AnnotationError> {
        self.check(handle)?;
        self.node.values[handle.index].1 = value.into();
        Ok(())
    }

    fn check(&self, handle: &ValueHandle) -> Result<(), AnnotationError> {
        let in_bounds = self
            .node
            .values
            .get(handle.index)
            .is_some_and(|(key, _)| *key == handle.key);
        if handle.generation != self.generation || !in_bounds {
            return Err(AnnotationError::StaleHandle {
                key: handle.key.clone(),
            });
        }
        Ok(())
    }

    /// Every stored key with a live handle. Repeated keys resolve to their
    /// first occurrence.
    pub fn get_all(&self) -> HashMap<String, ValueHandle> {
        let mut all = HashMap::new();
        for (key, _) in &self.node.values {
            if !all.contains_key(key) {
                if let Some(handle) = self.get(key) {
                    all.insert(key.clone(), handle);
                }
            }
        }
        all
    }

    /// Append a new pair. A cached position for the key is dropped so the
    /// next `get` resolves it again.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<AnnotationValue>) {
        let key = key.into();
        self.cache.get_mut().remove(&key);
        self.node.values.push((key, value.into()));
    }

    pub fn set_or_append(&mut self, key: &str, value: impl Into<AnnotationValue>) {
        match self.get(key) {
            Some(handle) => self.node.values[handle.index].1 = value.into(),
            None => self.append(key, value),
        }
    }

    /// Remove the first pair stored under `key`, invalidating all handles.
    pub fn remove(&mut self, key: &str) -> Option<AnnotationValue> {
        let index = self.node.position(key)?;
        let (_, value) = self.node.values.remove(index);
        self.generation = self.generation.wrapping_add(1);
        self.cache.get_mut().clear();
        Some(value)
    }

    pub fn find_nested(&self, key: &str) -> Option<&AnnotationNode> {
        self.value(key).and_then(AnnotationValue::as_annotation)
    }

    /// Child view over an annotation-typed value.
    pub fn nested(&mut self, key: &str) -> Option<AnnotationView<'_>> {
        self.nested_path(&[key])
    }

    /// Child view reached by following annotation-typed values key by key.
    pub fn nested_path(&mut self, keys: &[&str]) -> Option<AnnotationView<'_>> {
        let mut node: &mut AnnotationNode = &mut *self.node;
        for key in keys {
            let index = node.position(key)?;
            node = node.values[index].1.as_annotation_mut()?;
        }
        Some(AnnotationView::new(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inject() -> AnnotationNode {
        AnnotationNode::new("LInject;")
            .with("method", vec!["tick()V"])
            .with("at", AnnotationNode::new("LAt;").with("value", "HEAD"))
            .with("remap", false)
    }

    #[test]
    fn absent_key_is_none() {
        let mut node = inject();
        let view = AnnotationView::new(&mut node);
        assert!(view.get("missing").is_none());
        assert!(view.value("missing").is_none());
    }

    #[test]
    fn writes_are_visible_through_other_handles() {
        let mut node = inject();
        let mut view = AnnotationView::new(&mut node);
        let first = view.get("remap").unwrap();
        let second = view.get("remap").unwrap();
        view.write(&first, true).unwrap();
        assert_eq!(view.read(&second).unwrap(), &AnnotationValue::Boolean(true));
        drop(view);
        assert_eq!(node.get("remap"), Some(&AnnotationValue::Boolean(true)));
    }

    #[test]
    fn append_invalidates_cached_key() {
        let mut node = AnnotationNode::new("LA;");
        let mut view = AnnotationView::new(&mut node);
        assert!(view.get("index").is_none());
        view.append("index", 4);
        assert_eq!(view.get_int("index"), Some(4));
    }

    #[test]
    fn remove_makes_earlier_handles_stale() {
        let mut node = inject();
        let mut view = AnnotationView::new(&mut node);
        let remap = view.get("remap").unwrap();
        view.remove("method");
        assert_eq!(
            view.read(&remap),
            Err(AnnotationError::StaleHandle {
                key: "remap".to_string()
            })
        );
        let fresh = view.get("remap").unwrap();
        assert_eq!(view.read(&fresh).unwrap(), &AnnotationValue::Boolean(false));
    }

    #[test]
    fn get_all_reuses_first_occurrence() {
        let mut node = AnnotationNode::new("LA;").with("k", 1).with("k", 2).with("j", 3);
        let view = AnnotationView::new(&mut node);
        let all = view.get_all();
        assert_eq!(all.len(), 2);
        assert_eq!(view.read_int(&all["k"]).unwrap(), 1);
        assert_eq!(view.read_int(&all["j"]).unwrap(), 3);
    }

    #[test]
    fn nested_views_write_through() {
        let mut node = inject();
        let mut view = AnnotationView::new(&mut node);
        {
            let mut at = view.nested("at").unwrap();
            at.set_or_append("value", "INVOKE");
            at.set_or_append("target", "La/B;c()V");
        }
        let at = view.find_nested("at").unwrap();
        assert_eq!(at.get("value").and_then(|v| v.as_str()), Some("INVOKE"));
        assert_eq!(at.get("target").and_then(|v| v.as_str()), Some("La/B;c()V"));
    }

    #[test]
    fn read_int_reports_type_mismatch() {
        let mut node = inject();
        let view = AnnotationView::new(&mut node);
        let handle = view.get("remap").unwrap();
        assert!(matches!(
            view.read_int(&handle),
            Err(AnnotationError::TypeMismatch { expected: "int", .. })
        ));
    }
}
