//! Translation of docmodel queries into driver options.

use bson::Document;
use docmodel_core::query::{CountOptions, Query};
use mongodb::options::{CountOptions as MongoCountOptions, FindOptions};

/// Splits a [`Query`] into its filter document and the driver's find options.
///
/// A limit of zero is treated as no limit.
pub fn find_options(query: Query) -> (Document, FindOptions) {
    let mut options = FindOptions::default();

    if let Some(skip) = query.skip.filter(|skip| *skip > 0) {
        options.skip = Some(skip);
    }
    if let Some(limit) = query.limit.filter(|limit| *limit > 0) {
        options.limit = Some(i64::try_from(limit).unwrap_or(i64::MAX));
    }
    if let Some(sort) = query.sort.filter(|sort| !sort.is_empty()) {
        options.sort = Some(sort.to_document());
    }

    (query.filter, options)
}

pub fn count_options(options: &CountOptions) -> MongoCountOptions {
    let mut count = MongoCountOptions::default();

    count.skip = options.skip.filter(|skip| *skip > 0);
    count.limit = options.limit.filter(|limit| *limit > 0);

    count
}
