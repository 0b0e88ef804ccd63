use tagscope_domain::{
	Aspect, NodeRef, StoreRef, TagScope,
	tag::normalize_tag_name,
	tag_details::{compare_tag_names, read_tag_details},
};
use tagscope_storage::AccessContext;

use crate::{Result, TaggingService};

impl TaggingService {
	/// The nearest tag scope of `node`, with its cache decoded.
	pub async fn find_tag_scope(
		&self,
		access: &AccessContext,
		node: &NodeRef,
	) -> Result<Option<TagScope>> {
		match self.resolver.resolve_first(access, node).await? {
			Some(scope) => Ok(Some(self.load_tag_scope(scope).await?)),
			None => Ok(None),
		}
	}

	/// Every tag scope of `node`, nearest first.
	pub async fn find_all_tag_scopes(
		&self,
		access: &AccessContext,
		node: &NodeRef,
	) -> Result<Vec<TagScope>> {
		let scopes = self.resolver.resolve_all(access, node).await?;
		let mut views = Vec::with_capacity(scopes.len());

		for scope in scopes {
			views.push(self.load_tag_scope(scope).await?);
		}

		Ok(views)
	}

	pub async fn is_tag_scope(&self, node: &NodeRef) -> Result<bool> {
		Ok(self.backends.nodes.has_aspect(&AccessContext::system(), node, Aspect::TagScope).await?)
	}

	/// Tag names of `store` containing `filter` (case-insensitive), in name order.
	pub async fn list_tags(&self, store: &StoreRef, filter: Option<&str>) -> Result<Vec<String>> {
		let filter = filter.map(normalize_tag_name).filter(|filter| !filter.is_empty());
		let mut names: Vec<String> = self
			.backends
			.nodes
			.list_tags(store)
			.await?
			.into_iter()
			.map(|tag| tag.name)
			.filter(|name| filter.as_deref().is_none_or(|filter| name.contains(filter)))
			.collect();

		names.sort_by(|a, b| compare_tag_names(a, b));

		Ok(names)
	}

	/// One page of [`TaggingService::list_tags`] plus the unpaged total.
	pub async fn list_tags_paged(
		&self,
		store: &StoreRef,
		filter: Option<&str>,
		from: usize,
		page_size: usize,
	) -> Result<(Vec<String>, usize)> {
		let names = self.list_tags(store, filter).await?;
		let total = names.len();
		let page = names.into_iter().skip(from).take(page_size).collect();

		Ok((page, total))
	}

	/// Number of taggable, non working copy nodes per tag. Unused tags are left out.
	pub async fn count_tagged_nodes_by_tag(&self, store: &StoreRef) -> Result<Vec<(String, u64)>> {
		let system = AccessContext::system();
		let nodes = &self.backends.nodes;
		let mut facets = Vec::new();

		for tag in nodes.list_tags(store).await? {
			let mut count: u64 = 0;

			for node in nodes.find_tagged_nodes(store, &tag.node_ref, None).await? {
				if !nodes.has_aspect(&system, &node, Aspect::WorkingCopy).await? {
					count += 1;
				}
			}

			if count > 0 {
				facets.push((tag.name, count));
			}
		}

		facets.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| compare_tag_names(&a.0, &b.0)));

		Ok(facets)
	}

	async fn load_tag_scope(&self, scope: NodeRef) -> Result<TagScope> {
		let tags = self
			.backends
			.nodes
			.read_tag_cache(&scope)
			.await?
			.as_deref()
			.map(read_tag_details)
			.unwrap_or_default();

		Ok(TagScope::new(scope, tags))
	}
}
