//! Ordering, projection and population directives

/// Field every document is sorted by when no `sort` is given
pub const DEFAULT_SORT_FIELD: &str = "createdAt";

/// Internal revision counter kept out of list responses by default
pub const VERSION_FIELD: &str = "__v";

/// Document identifier, always part of a projection
pub const ID_FIELD: &str = "_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Parse one token: `price` ascending, `-price` descending.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        match token.strip_prefix('-') {
            Some(field) if !field.is_empty() => Some(Self::descending(field)),
            Some(_) => None,
            None if !token.is_empty() => Some(Self::ascending(token)),
            None => None,
        }
    }

    /// Parse a comma-separated list, skipping empty tokens.
    pub fn parse_list(spec: &str) -> Vec<Self> {
        spec.split(',').filter_map(Self::parse).collect()
    }
}

/// Which fields a query returns
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Projection {
    /// Only these fields (plus `_id`)
    Include(Vec<String>),
    /// Everything except these fields
    Exclude(Vec<String>),
}

impl Projection {
    /// Every field
    pub fn all() -> Self {
        Self::Exclude(Vec::new())
    }

    /// Every business field; drops the revision counter
    pub fn without_version() -> Self {
        Self::Exclude(vec![VERSION_FIELD.to_string()])
    }

    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Include(fields.into_iter().map(Into::into).collect())
    }

    pub fn exclude<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Exclude(fields.into_iter().map(Into::into).collect())
    }

    /// Parse a `fields` parameter.
    ///
    /// Plain tokens select fields. When every token carries a `-` prefix the
    /// projection excludes them instead; on a mix the plain tokens win and
    /// the prefixed ones are ignored. Returns `None` if nothing usable is
    /// left.
    pub fn parse(spec: &str) -> Option<Self> {
        let tokens: Vec<&str> = spec
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .collect();

        let included: Vec<String> = tokens
            .iter()
            .filter(|token| !token.starts_with('-'))
            .map(|token| (*token).to_string())
            .collect();
        if !included.is_empty() {
            return Some(Self::Include(included));
        }

        let excluded: Vec<String> = tokens
            .iter()
            .filter_map(|token| token.strip_prefix('-'))
            .filter(|field| !field.is_empty())
            .map(str::to_string)
            .collect();
        (!excluded.is_empty()).then_some(Self::Exclude(excluded))
    }

    /// Whether the explicit field list names `field`
    pub fn names(&self, field: &str) -> bool {
        match self {
            Self::Include(fields) | Self::Exclude(fields) => fields.iter().any(|f| f == field),
        }
    }
}

/// How a populated path finds its related documents
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Relation {
    /// The path holds one identifier or an array of identifiers
    Reference,
    /// Related documents point back at this one through `foreign_field`
    Virtual { foreign_field: String },
}

/// Expand related documents inline
///
/// ```rust
/// use tourbook_service::query::{Populate, Projection};
///
/// let reviews = Populate::virtual_field("reviews", "reviews", "tour")
///     .with_populate(Populate::reference("user", "users")
///         .with_select(Projection::include(["name", "photo"])));
/// assert_eq!(reviews.nested.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Populate {
    /// Field on this document that receives the related documents
    pub path: String,
    /// Collection the related documents live in
    pub from: String,
    pub relation: Relation,
    /// Projection applied to each related document
    pub select: Projection,
    /// Population applied to the related documents themselves
    pub nested: Vec<Populate>,
}

impl Populate {
    pub fn reference(path: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            from: from.into(),
            relation: Relation::Reference,
            select: Projection::all(),
            nested: Vec::new(),
        }
    }

    pub fn virtual_field(
        path: impl Into<String>,
        from: impl Into<String>,
        foreign_field: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            from: from.into(),
            relation: Relation::Virtual {
                foreign_field: foreign_field.into(),
            },
            select: Projection::all(),
            nested: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_select(mut self, select: Projection) -> Self {
        self.select = select;
        self
    }

    #[must_use]
    pub fn with_populate(mut self, nested: Populate) -> Self {
        self.nested.push(nested);
        self
    }
}
