pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_tag_store_nodes.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_tag_store_nodes.sql")),
				"tables/002_tag_store_node_aspects.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_tag_store_node_aspects.sql")),
				"tables/003_tag_store_tags.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_tag_store_tags.sql")),
				"tables/004_tag_store_node_tags.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_tag_store_node_tags.sql")),
				"tables/005_tag_scope_changes.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_tag_scope_changes.sql")),
				"tables/006_tag_scope_locks.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_tag_scope_locks.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
