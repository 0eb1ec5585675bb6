use hashbrown::HashSet;
use serde::Deserialize;

/// service display names we never remind about. Names are matched exactly, we
/// implement Deserialize our selves to reject blank entries which would
/// otherwise silently match services without a name
#[derive(Debug, Clone, Default)]
pub struct ExclusionList(HashSet<String>);

impl ExclusionList {
	pub fn contains(&self, service_name: &str) -> bool {
		self.0.contains(service_name)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}
}

impl<S: Into<String>> FromIterator<S> for ExclusionList {
	fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
		Self(iter.into_iter().map(Into::into).collect())
	}
}

struct ExclusionListVisitor();

impl<'de> serde::de::Visitor<'de> for ExclusionListVisitor {
	type Value = ExclusionList;

	fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
		formatter.write_str("a list of non-empty service names")
	}

	fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
	where
		A: serde::de::SeqAccess<'de>,
	{
		let mut set = HashSet::new();

		while let Some(name) = seq.next_element::<String>()? {
			if name.trim().is_empty() {
				return Err(serde::de::Error::invalid_value(
					serde::de::Unexpected::Str(&name),
					&self,
				));
			}

			set.insert(name);
		}

		Ok(ExclusionList(set))
	}
}

impl<'de> Deserialize<'de> for ExclusionList {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		deserializer.deserialize_seq(ExclusionListVisitor())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn exact_match() {
		let list: ExclusionList =
			serde_json::from_str(r#"["NORMAL Severity Airflow DI", "HIGH Severity Airflow DO"]"#)
				.unwrap();

		assert_eq!(list.len(), 2);
		assert!(list.contains("HIGH Severity Airflow DO"));
		assert!(!list.contains("HIGH Severity Airflow"));
		assert!(!list.contains("high severity airflow do"));
	}

	#[test]
	fn blank_names_are_rejected() {
		assert!(serde_json::from_str::<ExclusionList>(r#"["billing", "  "]"#).is_err());
	}
}
