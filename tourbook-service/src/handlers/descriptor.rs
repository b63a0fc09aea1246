//! Which collection a set of handlers serves and how it is labelled

/// Nested mounting: the route parameter that carries the parent id and the
/// document field it fills
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentScope {
    /// Path parameter name, e.g. `tourId`
    pub param: String,
    /// Document field, e.g. `tour`
    pub field: String,
}

/// Describes one resource
///
/// ```rust
/// use tourbook_service::handlers::ResourceDescriptor;
///
/// let reviews = ResourceDescriptor::new("reviews", "review").nested_under("tourId", "tour");
/// assert_eq!(reviews.plural_label(), "reviews");
/// assert_eq!(reviews.parent.unwrap().field, "tour");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub collection: String,
    /// Lowercase singular name used in envelopes and messages
    pub label: String,
    pub parent: Option<ParentScope>,
}

impl ResourceDescriptor {
    pub fn new(collection: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            label: label.into(),
            parent: None,
        }
    }

    #[must_use]
    pub fn nested_under(mut self, param: impl Into<String>, field: impl Into<String>) -> Self {
        self.parent = Some(ParentScope {
            param: param.into(),
            field: field.into(),
        });
        self
    }

    pub fn plural_label(&self) -> String {
        format!("{}s", self.label)
    }
}
