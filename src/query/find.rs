use super::types::{FilterPredicate, Populate, Projection, SortSpec};

/// Immutable description of a read, refined step by step and executed once by a
/// [`DataAccessor`](crate::database::DataAccessor).
#[derive(Debug, Clone, PartialEq)]
pub struct FindQuery {
    collection: String,
    filter: FilterPredicate,
    projection: Projection,
    sort: SortSpec,
    skip: u64,
    limit: Option<u64>,
    populate: Vec<Populate>,
    reveal_hidden: bool,
}

impl FindQuery {
    /// Unsorted, unwindowed read of every record matching `filter`.
    pub fn find(collection: impl Into<String>, filter: FilterPredicate) -> Self {
        Self {
            collection: collection.into(),
            filter,
            projection: Projection::All,
            sort: SortSpec::none(),
            skip: 0,
            limit: None,
            populate: vec![],
            reveal_hidden: false,
        }
    }

    pub fn select_fields(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn populate(mut self, populate: Populate) -> Self {
        self.populate.push(populate);
        self
    }

    /// Includes the collection's hidden fields (password hashes, reset tokens).
    pub fn reveal_hidden(mut self) -> Self {
        self.reveal_hidden = true;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn filter(&self) -> &FilterPredicate {
        &self.filter
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn sort_spec(&self) -> &SortSpec {
        &self.sort
    }

    pub fn skip_count(&self) -> u64 {
        self.skip
    }

    pub fn limit_count(&self) -> Option<u64> {
        self.limit
    }

    pub fn relations(&self) -> &[Populate] {
        &self.populate
    }

    pub fn hidden_revealed(&self) -> bool {
        self.reveal_hidden
    }
}
