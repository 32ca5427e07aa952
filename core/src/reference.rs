use once_cell::sync::Lazy;

/// Lookup catalogs consulted by the field mappers.
///
/// These mirror the reference tables of the host application; unknown codes
/// make the mapper omit the field rather than invent a value.
pub struct ReferenceData {
	countries: &'static [Country],
	states: &'static [CountryState],
	titles: &'static [(&'static str, &'static str)],
}

pub struct Country {
	pub code: &'static str,
	pub name: &'static str,
}

pub struct CountryState {
	pub country: &'static str,
	pub code: &'static str,
	pub name: &'static str,
}

impl ReferenceData {
	#[must_use]
	pub fn country_name(&self, code: &str) -> Option<&'static str> {
		self.countries
			.iter()
			.find(|country| country.code.eq_ignore_ascii_case(code))
			.map(|country| country.name)
	}

	#[must_use]
	pub fn has_country(&self, code: &str) -> bool {
		self.country_name(code).is_some()
	}

	#[must_use]
	pub fn state_name(&self, country_code: &str, state_code: &str) -> Option<&'static str> {
		self.states
			.iter()
			.find(|state| {
				state.country.eq_ignore_ascii_case(country_code)
					&& state.code.eq_ignore_ascii_case(state_code)
			})
			.map(|state| state.name)
	}

	#[must_use]
	pub fn title(&self, salutation: &str) -> Option<&'static str> {
		self.titles
			.iter()
			.find(|(remote, _)| remote.eq_ignore_ascii_case(salutation))
			.map(|(_, local)| *local)
	}

	#[must_use]
	pub fn salutation(&self, title: &str) -> Option<&'static str> {
		self.titles
			.iter()
			.find(|(_, local)| local.eq_ignore_ascii_case(title))
			.map(|(remote, _)| *remote)
	}
}

pub static REFERENCE: Lazy<ReferenceData> = Lazy::new(|| ReferenceData {
	countries: &[
		Country { code: "US", name: "United States" },
		Country { code: "CA", name: "Canada" },
		Country { code: "GB", name: "United Kingdom" },
		Country { code: "FR", name: "France" },
		Country { code: "DE", name: "Germany" },
		Country { code: "CH", name: "Switzerland" },
		Country { code: "IT", name: "Italy" },
		Country { code: "ES", name: "Spain" },
		Country { code: "AU", name: "Australia" },
		Country { code: "JP", name: "Japan" },
	],
	states: &[
		CountryState { country: "US", code: "CA", name: "California" },
		CountryState { country: "US", code: "NY", name: "New York" },
		CountryState { country: "US", code: "TX", name: "Texas" },
		CountryState { country: "US", code: "WA", name: "Washington" },
		CountryState { country: "CA", code: "ON", name: "Ontario" },
		CountryState { country: "CA", code: "QC", name: "Quebec" },
		CountryState { country: "CH", code: "VD", name: "Vaud" },
		CountryState { country: "CH", code: "ZH", name: "Zurich" },
	],
	titles: &[
		("Mr.", "mister"),
		("Mrs.", "madam"),
		("Ms.", "madam"),
		("Dr.", "doctor"),
		("Prof.", "professor"),
	],
});

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lookups_are_case_insensitive() {
		assert_eq!(REFERENCE.country_name("us"), Some("United States"));
		assert_eq!(REFERENCE.state_name("us", "ca"), Some("California"));
		assert_eq!(REFERENCE.title("MR."), Some("mister"));
		assert!(REFERENCE.country_name("ZZ").is_none());
	}
}
