//! Layer store: the board's elements in z-order, selection, grouping and
//! local history.

use crate::elements::{
    Element, ElementId, ElementResult, ElementType, Properties, UserId,
    default_properties, hit_test, union_bounds,
};
use crate::history::{History, HistoryAction, HistoryEntry};
use kurbo::{Point, Rect, Vec2};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Offset applied to duplicated and pasted elements.
pub const DUPLICATE_OFFSET: f64 = 20.0;

/// A change to persisted state that the sync layer should push.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Upsert(ElementId),
    Delete(ElementId),
    Grouped {
        group: ElementId,
        children: Vec<ElementId>,
    },
    Ungrouped {
        group: ElementId,
    },
}

/// Elements of one board, kept sorted by ascending `z_index`.
#[derive(Debug, Clone)]
pub struct LayerStore {
    elements: Vec<Element>,
    selection: Vec<ElementId>,
    history: History,
    clipboard: Vec<Element>,
    user: Option<UserId>,
}

impl Default for LayerStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl LayerStore {
    /// Create an empty store. `user` stamps `created_by`/`updated_by`.
    pub fn new(user: Option<UserId>) -> Self {
        let mut store = Self {
            elements: Vec::new(),
            selection: Vec::new(),
            history: History::default(),
            clipboard: Vec::new(),
            user,
        };
        store.snapshot(HistoryAction::Load);
        store
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    // --- queries -------------------------------------------------------

    /// Elements back to front.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Mutable access for in-place edits (drag, resize). Call [`commit`](Self::commit)
    /// once the interaction finishes so the change lands in history.
    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    fn position(&self, id: ElementId) -> Option<usize> {
        self.elements.iter().position(|e| e.id == id)
    }

    /// Topmost element under `point`.
    pub fn element_at(&self, point: Point) -> Option<ElementId> {
        self.elements
            .iter()
            .rev()
            .find(|e| hit_test(point, e))
            .map(|e| e.id)
    }

    /// Union of all element bounds.
    pub fn content_bounds(&self) -> Option<Rect> {
        union_bounds(&self.elements)
    }

    pub fn max_z(&self) -> Option<i64> {
        self.elements.last().map(|e| e.z_index)
    }

    pub fn min_z(&self) -> Option<i64> {
        self.elements.first().map(|e| e.z_index)
    }

    /// z-index for an element placed on top of everything.
    pub fn next_z(&self) -> i64 {
        self.max_z().map_or(1, |z| z + 1)
    }

    /// Connectors attached to `id` at either end.
    pub fn connectors_attached_to(&self, id: ElementId) -> Vec<ElementId> {
        self.elements
            .iter()
            .filter(|e| match &e.properties {
                Properties::Connector(c) => {
                    c.start_element == Some(id) || c.end_element == Some(id)
                }
                _ => false,
            })
            .map(|e| e.id)
            .collect()
    }

    // --- mutations -----------------------------------------------------

    fn sort(&mut self) {
        self.elements.sort_by_key(|e| e.z_index);
    }

    fn snapshot(&mut self, action: HistoryAction) {
        self.history
            .record(HistoryEntry::new(action, &self.elements, &self.selection));
    }

    /// Record a history entry for edits already applied through
    /// [`element_mut`](Self::element_mut).
    pub fn commit(&mut self, action: HistoryAction) {
        self.sort();
        self.snapshot(action);
    }

    pub fn add(&mut self, element: Element) -> ElementId {
        let id = element.id;
        self.elements.push(element);
        self.sort();
        self.snapshot(HistoryAction::AddElement);
        id
    }

    /// Remove an element. Returns `false` if it does not exist.
    pub fn remove(&mut self, id: ElementId) -> bool {
        if !self.detach(id) {
            return false;
        }
        self.snapshot(HistoryAction::RemoveElement);
        true
    }

    /// Remove without history, keeping group links consistent on both sides.
    fn detach(&mut self, id: ElementId) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        let removed = self.elements.remove(pos);
        if removed.is_group() {
            for element in &mut self.elements {
                if element.group_id == Some(id) {
                    element.group_id = None;
                }
            }
        }
        if let Some(group_id) = removed.group_id {
            self.unlink_child(group_id, id);
        }
        self.selection.retain(|s| *s != id);
        true
    }

    fn unlink_child(&mut self, group_id: ElementId, child: ElementId) {
        if let Some(Properties::Group(group)) =
            self.element_mut(group_id).map(|g| &mut g.properties)
        {
            group.children.retain(|c| *c != child);
        }
    }

    /// Merge a raw property patch. Invalid results are rejected unapplied.
    pub fn update(&mut self, id: ElementId, patch: &Map<String, Value>) -> ElementResult<bool> {
        let user = self.user.clone();
        let Some(element) = self.element_mut(id) else {
            return Ok(false);
        };
        element.properties = element.properties.merged(patch)?;
        element.touch(user.as_ref());
        self.snapshot(HistoryAction::UpdateElement);
        Ok(true)
    }

    /// Replace an element's properties with an already-typed value.
    pub fn set_properties(&mut self, id: ElementId, properties: Properties) -> bool {
        let user = self.user.clone();
        let Some(element) = self.element_mut(id) else {
            return false;
        };
        element.properties = properties;
        element.touch(user.as_ref());
        self.snapshot(HistoryAction::UpdateElement);
        true
    }

    fn set_z(&mut self, id: ElementId, z_index: i64, action: HistoryAction) -> bool {
        let user = self.user.clone();
        let Some(element) = self.element_mut(id) else {
            return false;
        };
        element.z_index = z_index;
        element.touch(user.as_ref());
        self.sort();
        self.snapshot(action);
        true
    }

    pub fn bring_to_front(&mut self, id: ElementId) -> bool {
        let z = self.next_z();
        self.set_z(id, z, HistoryAction::BringToFront)
    }

    pub fn send_to_back(&mut self, id: ElementId) -> bool {
        let z = self.min_z().map_or(0, |z| z - 1);
        self.set_z(id, z, HistoryAction::SendToBack)
    }

    /// Swap z-order with the next element above. Returns the ids whose
    /// z-index changed.
    pub fn move_up(&mut self, id: ElementId) -> Vec<ElementId> {
        match self.position(id) {
            Some(pos) if pos + 1 < self.elements.len() => {
                self.swap_z(pos, pos + 1, HistoryAction::MoveUp)
            }
            _ => Vec::new(),
        }
    }

    /// Swap z-order with the next element below.
    pub fn move_down(&mut self, id: ElementId) -> Vec<ElementId> {
        match self.position(id) {
            Some(pos) if pos > 0 => self.swap_z(pos, pos - 1, HistoryAction::MoveDown),
            _ => Vec::new(),
        }
    }

    fn swap_z(&mut self, pos: usize, neighbour: usize, action: HistoryAction) -> Vec<ElementId> {
        let (z, other_z) = (self.elements[pos].z_index, self.elements[neighbour].z_index);
        if z == other_z {
            // Equal keys would not reorder; nudge past the neighbour instead.
            self.elements[pos].z_index = if neighbour > pos { z + 1 } else { z - 1 };
        } else {
            self.elements[pos].z_index = other_z;
            self.elements[neighbour].z_index = z;
        }
        let user = self.user.clone();
        self.elements[pos].touch(user.as_ref());
        self.elements[neighbour].touch(user.as_ref());
        let ids = vec![self.elements[pos].id, self.elements[neighbour].id];
        self.sort();
        self.snapshot(action);
        ids
    }

    /// Group at least two existing elements under a new group element.
    ///
    /// The group spans the union of the children's bounds and sits one above
    /// the highest child. Returns `None` when fewer than two ids resolve.
    pub fn group(&mut self, ids: &[ElementId]) -> Option<ElementId> {
        let mut children: Vec<ElementId> = Vec::new();
        for id in ids {
            if self.element(*id).is_some() && !children.contains(id) {
                children.push(*id);
            }
        }
        if children.len() < 2 {
            return None;
        }
        let members: Vec<&Element> = children.iter().filter_map(|id| self.element(*id)).collect();
        let frame = union_bounds(members.iter().copied())?;
        let z = members.iter().map(|e| e.z_index).max()? + 1;

        let mut props = match default_properties(ElementType::Group) {
            Properties::Group(group) => group,
            _ => return None,
        };
        props.x = frame.x0;
        props.y = frame.y0;
        props.width = frame.width();
        props.height = frame.height();
        props.children = children.clone();
        let group = Element::new(Properties::Group(props), z, self.user.clone());
        let group_id = group.id;

        self.link_children(group_id, &children);
        self.elements.push(group);
        self.sort();
        self.selection = vec![group_id];
        self.snapshot(HistoryAction::GroupElements);
        Some(group_id)
    }

    /// Point each child at `group_id`, unlinking it from any previous group.
    fn link_children(&mut self, group_id: ElementId, children: &[ElementId]) {
        for child in children {
            let previous = self.element(*child).and_then(|e| e.group_id);
            if let Some(previous) = previous.filter(|p| *p != group_id) {
                self.unlink_child(previous, *child);
            }
            if let Some(element) = self.element_mut(*child) {
                element.group_id = Some(group_id);
            }
        }
    }

    /// Dissolve a group. No-op unless `group_id` names a group element.
    pub fn ungroup(&mut self, group_id: ElementId) -> bool {
        if !self.element(group_id).is_some_and(Element::is_group) {
            return false;
        }
        let children = self.release_children(group_id);
        if let Some(pos) = self.position(group_id) {
            self.elements.remove(pos);
        }
        self.selection = children;
        self.snapshot(HistoryAction::UngroupElements);
        true
    }

    fn release_children(&mut self, group_id: ElementId) -> Vec<ElementId> {
        let mut released = Vec::new();
        for element in &mut self.elements {
            if element.group_id == Some(group_id) {
                element.group_id = None;
                released.push(element.id);
            }
        }
        released
    }

    /// Copy an element with a fresh id, offset and placed on top.
    pub fn duplicate(&mut self, id: ElementId) -> Option<ElementId> {
        let source = self.element(id).filter(|e| !e.is_group())?;
        let mut copy = Element::new(source.properties.clone(), self.next_z(), self.user.clone());
        copy.translate(Vec2::new(DUPLICATE_OFFSET, DUPLICATE_OFFSET));
        let copy_id = copy.id;
        self.elements.push(copy);
        self.sort();
        self.selection = vec![copy_id];
        self.snapshot(HistoryAction::Duplicate);
        Some(copy_id)
    }

    /// Copy the given elements to the clipboard. Groups are skipped.
    pub fn copy(&mut self, ids: &[ElementId]) -> usize {
        self.clipboard = ids
            .iter()
            .filter_map(|id| self.element(*id))
            .filter(|e| !e.is_group())
            .cloned()
            .collect();
        self.clipboard.len()
    }

    /// Paste clipboard contents as new elements; repeated pastes cascade.
    pub fn paste(&mut self) -> Vec<ElementId> {
        if self.clipboard.is_empty() {
            return Vec::new();
        }
        let offset = Vec2::new(DUPLICATE_OFFSET, DUPLICATE_OFFSET);
        let mut pasted = Vec::with_capacity(self.clipboard.len());
        let mut z = self.next_z();
        for item in &mut self.clipboard {
            item.translate(offset);
            let element = Element::new(item.properties.clone(), z, self.user.clone());
            z += 1;
            pasted.push(element.id);
            self.elements.push(element);
        }
        self.sort();
        self.selection = pasted.clone();
        self.snapshot(HistoryAction::Paste);
        pasted
    }

    // --- selection -----------------------------------------------------

    pub fn selection(&self) -> &[ElementId] {
        &self.selection
    }

    pub fn is_selected(&self, id: ElementId) -> bool {
        self.selection.contains(&id)
    }

    /// The single selected element, if exactly one is selected.
    pub fn single_selected(&self) -> Option<&Element> {
        match self.selection.as_slice() {
            [id] => self.element(*id),
            _ => None,
        }
    }

    pub fn selected_elements(&self) -> impl Iterator<Item = &Element> {
        self.selection.iter().filter_map(|id| self.element(*id))
    }

    pub fn select(&mut self, ids: &[ElementId]) {
        self.selection.clear();
        for id in ids {
            self.add_to_selection(*id);
        }
    }

    pub fn add_to_selection(&mut self, id: ElementId) {
        if self.element(id).is_some() && !self.selection.contains(&id) {
            self.selection.push(id);
        }
    }

    pub fn remove_from_selection(&mut self, id: ElementId) {
        self.selection.retain(|s| *s != id);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    fn prune_selection(&mut self) {
        let elements = &self.elements;
        self.selection.retain(|id| elements.iter().any(|e| e.id == *id));
    }

    // --- history -------------------------------------------------------

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        self.history.refresh_current(&self.elements, &self.selection);
        let Some(entry) = self.history.undo() else {
            return false;
        };
        let (elements, selection) = (entry.elements.clone(), entry.selection.clone());
        self.restore(elements, selection);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(entry) = self.history.redo() else {
            return false;
        };
        let (elements, selection) = (entry.elements.clone(), entry.selection.clone());
        self.restore(elements, selection);
        true
    }

    fn restore(&mut self, elements: Vec<Element>, selection: Vec<ElementId>) {
        self.elements = elements;
        self.selection = selection;
        self.sort();
        self.prune_selection();
    }

    // --- remote application (never recorded in history) ----------------

    /// Replace the whole board, clear the selection and restart history.
    pub fn load_state(&mut self, elements: Vec<Element>) {
        self.elements = elements;
        self.sort();
        self.selection.clear();
        self.history.clear();
        self.snapshot(HistoryAction::Load);
    }

    /// Replace the whole board after a server-side restore. Selection is cleared.
    pub fn replace_all(&mut self, elements: Vec<Element>) {
        self.elements = elements;
        self.sort();
        self.selection.clear();
    }

    /// Insert or overwrite an element received from the server.
    pub fn apply_remote_upsert(&mut self, element: Element) {
        match self.position(element.id) {
            Some(pos) => self.elements[pos] = element,
            None => self.elements.push(element),
        }
        self.sort();
    }

    pub fn apply_remote_delete(&mut self, id: ElementId) -> bool {
        self.detach(id)
    }

    pub fn apply_remote_grouped(&mut self, group: Element, children: &[ElementId]) {
        let group_id = group.id;
        self.apply_remote_upsert(group);
        self.link_children(group_id, children);
    }

    /// Drop a group and overwrite its former children with the server copies.
    pub fn apply_remote_ungrouped(&mut self, group_id: ElementId, children: Vec<Element>) {
        self.release_children(group_id);
        if let Some(pos) = self.position(group_id) {
            self.elements.remove(pos);
        }
        for child in children {
            self.apply_remote_upsert(child);
        }
        self.prune_selection();
    }

    /// Adopt server bookkeeping after a successful write, keeping local
    /// properties as they are.
    pub fn acknowledge(&mut self, stored: &Element) -> bool {
        let Some(local) = self.element_mut(stored.id) else {
            return false;
        };
        local.version = stored.version;
        local.board_id = stored.board_id.clone();
        local.created_by = stored.created_by.clone();
        local.updated_by = stored.updated_by.clone();
        local.created_at = stored.created_at;
        local.updated_at = stored.updated_at;
        true
    }
}

/// Changes needed to turn `before` into `after`, for pushing a restored
/// history entry to the server.
pub fn diff_elements(before: &[Element], after: &[Element]) -> Vec<Change> {
    let old: HashMap<ElementId, &Element> = before.iter().map(|e| (e.id, e)).collect();
    let new: HashMap<ElementId, &Element> = after.iter().map(|e| (e.id, e)).collect();
    let mut changes = Vec::new();
    for element in before {
        if !new.contains_key(&element.id) {
            changes.push(Change::Delete(element.id));
        }
    }
    for element in after {
        let changed = old.get(&element.id).is_none_or(|prev| {
            prev.properties != element.properties
                || prev.z_index != element.z_index
                || prev.group_id != element.group_id
        });
        if changed {
            changes.push(Change::Upsert(element.id));
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{ShapeKind, bounds, default_shape};
    use serde_json::json;

    fn rect(x: f64, y: f64, w: f64, h: f64, z: i64) -> Element {
        let mut shape = default_shape(ShapeKind::Rectangle);
        shape.x = x;
        shape.y = y;
        shape.width = w;
        shape.height = h;
        Element::new(Properties::Shape(shape), z, Some("tester".into()))
    }

    fn is_sorted(store: &LayerStore) -> bool {
        store.elements().windows(2).all(|w| w[0].z_index <= w[1].z_index)
    }

    fn patch(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_add_keeps_z_order() {
        let mut store = LayerStore::default();
        store.add(rect(0.0, 0.0, 10.0, 10.0, 5));
        store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        store.add(rect(0.0, 0.0, 10.0, 10.0, 3));
        let zs: Vec<i64> = store.elements().iter().map(|e| e.z_index).collect();
        assert_eq!(zs, vec![1, 3, 5]);
    }

    #[test]
    fn test_sorted_after_mixed_operations() {
        let mut store = LayerStore::default();
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 2));
        let b = store.add(rect(0.0, 0.0, 10.0, 10.0, 7));
        let c = store.add(rect(0.0, 0.0, 10.0, 10.0, 4));
        assert!(is_sorted(&store));
        store.bring_to_front(a);
        assert!(is_sorted(&store));
        store.update(c, &patch(json!({ "x": 50 }))).unwrap();
        assert!(is_sorted(&store));
        store.remove(b);
        assert!(is_sorted(&store));
        store.send_to_back(c);
        assert!(is_sorted(&store));
        store.move_up(c);
        assert!(is_sorted(&store));
    }

    #[test]
    fn test_each_mutation_records_one_entry() {
        let mut store = LayerStore::default();
        assert_eq!(store.history().len(), 1);
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        assert_eq!(store.history().len(), 2);
        store.update(a, &patch(json!({ "width": 20 }))).unwrap();
        assert_eq!(store.history().len(), 3);
        store.select(&[a]);
        store.clear_selection();
        assert_eq!(store.history().len(), 3);
        store.remove(a);
        assert_eq!(store.history().len(), 4);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut store = LayerStore::default();
        assert!(!store.remove(ElementId::new_v4()));
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn test_update_merges_and_rejects_invalid() {
        let mut store = LayerStore::default();
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        assert!(store.update(a, &patch(json!({ "fillColor": "#ff0000" }))).unwrap());
        match &store.element(a).unwrap().properties {
            Properties::Shape(s) => assert_eq!(s.fill_color.to_string(), "#ff0000"),
            _ => unreachable!(),
        }
        let before = store.element(a).cloned();
        assert!(store.update(a, &patch(json!({ "x": null }))).is_err());
        assert_eq!(store.element(a).cloned(), before);
        assert!(!store.update(ElementId::new_v4(), &patch(json!({}))).unwrap());
    }

    #[test]
    fn test_bring_to_front_and_send_to_back() {
        let mut store = LayerStore::default();
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        let b = store.add(rect(0.0, 0.0, 10.0, 10.0, 2));
        store.bring_to_front(a);
        assert_eq!(store.element(a).unwrap().z_index, 3);
        assert_eq!(store.elements().last().unwrap().id, a);
        store.send_to_back(a);
        assert_eq!(store.element(a).unwrap().z_index, 1);
        assert_eq!(store.elements()[0].id, a);
        assert_eq!(store.elements()[1].id, b);
    }

    #[test]
    fn test_move_up_and_down_swap_with_neighbour() {
        let mut store = LayerStore::default();
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        let b = store.add(rect(0.0, 0.0, 10.0, 10.0, 2));
        let c = store.add(rect(0.0, 0.0, 10.0, 10.0, 3));
        assert_eq!(store.move_up(a), vec![a, b]);
        let order: Vec<_> = store.elements().iter().map(|e| e.id).collect();
        assert_eq!(order, vec![b, a, c]);
        assert!(store.move_up(c).is_empty());
        store.move_down(c);
        let order: Vec<_> = store.elements().iter().map(|e| e.id).collect();
        assert_eq!(order, vec![b, c, a]);
    }

    #[test]
    fn test_move_up_with_equal_z() {
        let mut store = LayerStore::default();
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        let b = store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        store.move_up(a);
        assert_eq!(store.elements().last().unwrap().id, a);
        assert!(store.element(a).unwrap().z_index > store.element(b).unwrap().z_index);
    }

    #[test]
    fn test_group_requires_two_valid_ids() {
        let mut store = LayerStore::default();
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        assert!(store.group(&[a]).is_none());
        assert!(store.group(&[a, ElementId::new_v4()]).is_none());
        assert!(store.group(&[a, a]).is_none());
    }

    #[test]
    fn test_group_bounds_and_z() {
        let mut store = LayerStore::default();
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 4));
        let b = store.add(rect(20.0, 30.0, 10.0, 10.0, 9));
        let group_id = store.group(&[a, b]).unwrap();
        let group = store.element(group_id).unwrap();
        assert_eq!(group.z_index, 10);
        let frame = bounds(group);
        assert!((frame.width() - 30.0).abs() < f64::EPSILON);
        assert!((frame.height() - 40.0).abs() < f64::EPSILON);
        assert_eq!(group.as_group().unwrap().children, vec![a, b]);
        assert_eq!(store.element(a).unwrap().group_id, Some(group_id));
        assert_eq!(store.element(b).unwrap().group_id, Some(group_id));
        assert_eq!(store.history().entries().last().unwrap().action, HistoryAction::GroupElements);
    }

    #[test]
    fn test_group_then_ungroup_restores_children() {
        let mut store = LayerStore::default();
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        let b = store.add(rect(40.0, 0.0, 10.0, 10.0, 2));
        let before_a = store.element(a).cloned().unwrap();
        let before_b = store.element(b).cloned().unwrap();

        let group_id = store.group(&[a, b]).unwrap();
        assert!(store.ungroup(group_id));

        assert!(store.element(group_id).is_none());
        assert_eq!(store.len(), 2);
        assert_eq!(store.element(a), Some(&before_a));
        assert_eq!(store.element(b), Some(&before_b));
    }

    #[test]
    fn test_ungroup_non_group_is_noop() {
        let mut store = LayerStore::default();
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        let entries = store.history().len();
        assert!(!store.ungroup(a));
        assert!(!store.ungroup(ElementId::new_v4()));
        assert_eq!(store.history().len(), entries);
    }

    #[test]
    fn test_regroup_unlinks_previous_group() {
        let mut store = LayerStore::default();
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        let b = store.add(rect(20.0, 0.0, 10.0, 10.0, 2));
        let c = store.add(rect(40.0, 0.0, 10.0, 10.0, 3));
        let first = store.group(&[a, b]).unwrap();
        let second = store.group(&[b, c]).unwrap();
        assert_eq!(store.element(first).unwrap().as_group().unwrap().children, vec![a]);
        assert_eq!(store.element(b).unwrap().group_id, Some(second));
    }

    #[test]
    fn test_remove_group_clears_child_links() {
        let mut store = LayerStore::default();
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        let b = store.add(rect(20.0, 0.0, 10.0, 10.0, 2));
        let group_id = store.group(&[a, b]).unwrap();
        store.remove(group_id);
        assert!(store.element(a).unwrap().group_id.is_none());
        store.group(&[a, b]).unwrap();
        store.remove(a);
        let group = store.elements().iter().find(|e| e.is_group()).unwrap();
        assert_eq!(group.as_group().unwrap().children, vec![b]);
    }

    #[test]
    fn test_selection_is_subset() {
        let mut store = LayerStore::default();
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        store.select(&[a, ElementId::new_v4()]);
        assert_eq!(store.selection(), &[a]);
        store.remove(a);
        assert!(store.selection().is_empty());
    }

    #[test]
    fn test_undo_redo_roundtrip_is_exact() {
        let mut store = LayerStore::default();
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        let b = store.add(rect(20.0, 0.0, 10.0, 10.0, 2));
        store.update(b, &patch(json!({ "height": 99 }))).unwrap();
        store.select(&[a]);

        let elements = store.elements().to_vec();
        let selection = store.selection().to_vec();
        assert!(store.undo());
        assert_ne!(store.elements(), elements.as_slice());
        assert!(store.redo());
        assert_eq!(store.elements(), elements.as_slice());
        assert_eq!(store.selection(), selection.as_slice());
    }

    #[test]
    fn test_undo_boundaries() {
        let mut store = LayerStore::default();
        assert!(!store.undo());
        assert!(!store.redo());
        store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        assert!(store.undo());
        assert!(store.is_empty());
        assert!(!store.undo());
        assert!(store.redo());
        assert_eq!(store.len(), 1);
        assert!(!store.redo());
    }

    #[test]
    fn test_new_mutation_discards_redo() {
        let mut store = LayerStore::default();
        store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        store.add(rect(0.0, 0.0, 10.0, 10.0, 2));
        store.undo();
        assert!(store.can_redo());
        store.add(rect(0.0, 0.0, 10.0, 10.0, 3));
        assert!(!store.can_redo());
    }

    #[test]
    fn test_element_at_prefers_topmost() {
        let mut store = LayerStore::default();
        let low = store.add(rect(0.0, 0.0, 100.0, 100.0, 1));
        let high = store.add(rect(50.0, 50.0, 100.0, 100.0, 2));
        assert_eq!(store.element_at(Point::new(75.0, 75.0)), Some(high));
        assert_eq!(store.element_at(Point::new(10.0, 10.0)), Some(low));
        assert_eq!(store.element_at(Point::new(500.0, 500.0)), None);
    }

    #[test]
    fn test_duplicate_offsets_copy() {
        let mut store = LayerStore::default();
        let a = store.add(rect(10.0, 10.0, 10.0, 10.0, 1));
        let copy = store.duplicate(a).unwrap();
        let frame = bounds(store.element(copy).unwrap());
        assert!((frame.x0 - 30.0).abs() < f64::EPSILON);
        assert_eq!(store.element(copy).unwrap().z_index, 2);
        assert_eq!(store.selection(), &[copy]);
    }

    #[test]
    fn test_copy_paste_cascades() {
        let mut store = LayerStore::default();
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        assert_eq!(store.copy(&[a]), 1);
        let first = store.paste();
        let second = store.paste();
        assert_eq!(first.len(), 1);
        let x1 = bounds(store.element(first[0]).unwrap()).x0;
        let x2 = bounds(store.element(second[0]).unwrap()).x0;
        assert!((x1 - 20.0).abs() < f64::EPSILON);
        assert!((x2 - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_remote_application_skips_history() {
        let mut store = LayerStore::default();
        let entries = store.history().len();
        let remote = rect(0.0, 0.0, 10.0, 10.0, 1);
        let id = remote.id;
        store.apply_remote_upsert(remote);
        assert_eq!(store.len(), 1);
        store.select(&[id]);
        assert!(store.apply_remote_delete(id));
        assert!(store.selection().is_empty());
        assert_eq!(store.history().len(), entries);
    }

    #[test]
    fn test_remote_group_and_ungroup() {
        let mut store = LayerStore::default();
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        let b = store.add(rect(20.0, 0.0, 10.0, 10.0, 2));
        let mut group = Element::new(default_properties(ElementType::Group), 3, None);
        if let Properties::Group(g) = &mut group.properties {
            g.children = vec![a, b];
        }
        let group_id = group.id;
        store.apply_remote_grouped(group, &[a, b]);
        assert_eq!(store.element(a).unwrap().group_id, Some(group_id));

        let mut child_a = store.element(a).cloned().unwrap();
        child_a.group_id = None;
        let mut child_b = store.element(b).cloned().unwrap();
        child_b.group_id = None;
        store.apply_remote_ungrouped(group_id, vec![child_a, child_b]);
        assert!(store.element(group_id).is_none());
        assert!(store.elements().iter().all(|e| e.group_id.is_none()));
    }

    #[test]
    fn test_load_state_resets_history_and_selection() {
        let mut store = LayerStore::default();
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        store.select(&[a]);
        store.load_state(vec![rect(0.0, 0.0, 5.0, 5.0, 2), rect(0.0, 0.0, 5.0, 5.0, 1)]);
        assert!(store.selection().is_empty());
        assert!(!store.can_undo());
        assert_eq!(store.elements()[0].z_index, 1);
    }

    #[test]
    fn test_acknowledge_keeps_local_properties() {
        let mut store = LayerStore::default();
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        let mut server = store.element(a).cloned().unwrap();
        server.version = 4;
        server.properties = default_properties(ElementType::Sticky);
        assert!(store.acknowledge(&server));
        let local = store.element(a).unwrap();
        assert_eq!(local.version, 4);
        assert_eq!(local.element_type(), ElementType::Shape);
    }

    #[test]
    fn test_diff_elements() {
        let a = rect(0.0, 0.0, 10.0, 10.0, 1);
        let b = rect(0.0, 0.0, 10.0, 10.0, 2);
        let mut moved = a.clone();
        moved.translate(Vec2::new(5.0, 0.0));
        let c = rect(0.0, 0.0, 10.0, 10.0, 3);
        let changes = diff_elements(&[a.clone(), b.clone()], &[moved, b.clone(), c.clone()]);
        assert_eq!(changes, vec![Change::Upsert(a.id), Change::Upsert(c.id)]);
        let changes = diff_elements(&[a.clone(), b.clone()], &[b]);
        assert_eq!(changes, vec![Change::Delete(a.id)]);
    }

    #[test]
    fn test_connectors_attached_to() {
        let mut store = LayerStore::default();
        let a = store.add(rect(0.0, 0.0, 10.0, 10.0, 1));
        let mut connector = Element::new(default_properties(ElementType::Connector), 2, None);
        if let Properties::Connector(c) = &mut connector.properties {
            c.end_element = Some(a);
        }
        let connector_id = store.add(connector);
        assert_eq!(store.connectors_attached_to(a), vec![connector_id]);
    }
}
