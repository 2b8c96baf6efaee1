use crate::descriptor::FieldDescriptor;

/// Visitor pattern for traversing descriptor trees immutably
///
/// The default implementations walk the entire tree in declaration order.
/// Override specific visit_* methods to act on leaves or layouts.
pub trait DescriptorVisitor: Sized {
    fn visit_descriptor(&mut self, descriptor: &FieldDescriptor) {
        walk_descriptor(self, descriptor);
    }

    fn visit_leaf(&mut self, _leaf: &FieldDescriptor) {
        // Leaf node, no children to walk
    }

    fn visit_layout(&mut self, layout: &FieldDescriptor) {
        walk_children(self, layout);
    }
}

/// Mutable visitor pattern for transforming descriptor trees
///
/// Use this when a pass rewrites descriptors in place (the compiler runs
/// one on its private deep clone).
pub trait DescriptorVisitorMut: Sized {
    fn visit_descriptor_mut(&mut self, descriptor: &mut FieldDescriptor) {
        walk_descriptor_mut(self, descriptor);
    }

    fn visit_leaf_mut(&mut self, _leaf: &mut FieldDescriptor) {
        // Leaf node, no children to walk
    }

    fn visit_layout_mut(&mut self, layout: &mut FieldDescriptor) {
        walk_children_mut(self, layout);
    }
}

pub fn walk_fields<V: DescriptorVisitor>(visitor: &mut V, fields: &[FieldDescriptor]) {
    for field in fields {
        visitor.visit_descriptor(field);
    }
}

pub fn walk_descriptor<V: DescriptorVisitor>(visitor: &mut V, descriptor: &FieldDescriptor) {
    if descriptor.is_layout() {
        visitor.visit_layout(descriptor);
    } else {
        visitor.visit_leaf(descriptor);
    }
}

pub fn walk_children<V: DescriptorVisitor>(visitor: &mut V, layout: &FieldDescriptor) {
    for child in layout.kind.children() {
        visitor.visit_descriptor(child);
    }
}

pub fn walk_fields_mut<V: DescriptorVisitorMut>(visitor: &mut V, fields: &mut [FieldDescriptor]) {
    for field in fields {
        visitor.visit_descriptor_mut(field);
    }
}

pub fn walk_descriptor_mut<V: DescriptorVisitorMut>(
    visitor: &mut V,
    descriptor: &mut FieldDescriptor,
) {
    if descriptor.is_layout() {
        visitor.visit_layout_mut(descriptor);
    } else {
        visitor.visit_leaf_mut(descriptor);
    }
}

pub fn walk_children_mut<V: DescriptorVisitorMut>(visitor: &mut V, layout: &mut FieldDescriptor) {
    for child in layout.kind.children_mut() {
        visitor.visit_descriptor_mut(child);
    }
}
