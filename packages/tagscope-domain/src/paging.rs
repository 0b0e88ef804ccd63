use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingRequest {
	pub skip_count: usize,
	/// `None` returns everything after `skip_count`.
	pub max_items: Option<usize>,
}
impl PagingRequest {
	pub fn new(skip_count: usize, max_items: usize) -> Self {
		Self { skip_count, max_items: Some(max_items) }
	}

	pub fn all() -> Self {
		Self { skip_count: 0, max_items: None }
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingResults<T> {
	pub page: Vec<T>,
	pub has_more_items: bool,
	pub total_items: usize,
}
impl<T> PagingResults<T> {
	/// Pages an already ordered list.
	pub fn from_sorted(items: Vec<T>, request: PagingRequest) -> Self {
		let total_items = items.len();
		let end = match request.max_items {
			Some(max_items) => request.skip_count.saturating_add(max_items).min(total_items),
			None => total_items,
		};
		let page = items
			.into_iter()
			.skip(request.skip_count)
			.take(end.saturating_sub(request.skip_count))
			.collect();

		Self { page, has_more_items: end < total_items, total_items }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pages_are_bounded_by_total() {
		let items: Vec<u32> = (0..5).collect();
		let first = PagingResults::from_sorted(items.clone(), PagingRequest::new(0, 2));
		let last = PagingResults::from_sorted(items.clone(), PagingRequest::new(4, 10));
		let beyond = PagingResults::from_sorted(items, PagingRequest::new(9, 2));

		assert_eq!(first.page, vec![0, 1]);
		assert!(first.has_more_items);
		assert_eq!(last.page, vec![4]);
		assert!(!last.has_more_items);
		assert!(beyond.page.is_empty());
		assert_eq!(beyond.total_items, 5);
	}
}
