use serde::{Deserialize, Serialize};

use crate::{db_types::Category, traits::Pagination};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQueryFilter {
    pub category: Option<Category>,
    pub featured: Option<bool>,
    /// Include deactivated products. Only ever set for admins.
    #[serde(skip)]
    pub include_inactive: bool,
    #[serde(flatten)]
    pub pagination: Pagination,
}
