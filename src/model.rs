use std::collections::BTreeMap;

use crate::capabilities::Capabilities;
use crate::catalog::{CATALOG, Category, Filter};

/// Legal tokens for one category on one unit, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryModel {
    pub prefix: &'static str,
    pub entries: Vec<(&'static str, &'static str)>,
}

impl CategoryModel {
    pub fn code(&self, token: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(t, _)| *t == token)
            .map(|(_, c)| *c)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(t, _)| *t)
    }
}

/// Per-unit view of the catalog. Every entry is something the hardware can do;
/// a missing category means the unit cannot perform that action at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitModel {
    categories: BTreeMap<Category, CategoryModel>,
}

impl UnitModel {
    pub fn resolve(caps: &Capabilities) -> Self {
        let mut categories = BTreeMap::new();

        for section in CATALOG {
            let mut entries = Vec::new();
            for entry in section.entries {
                match entry.filter {
                    None => entries.push((entry.token, entry.code)),
                    Some(Filter::Requires { flag, value }) => {
                        if caps.flag(flag) == Some(value) {
                            entries.push((entry.token, entry.code));
                        }
                    }
                    Some(Filter::Variant { flag, variants }) => {
                        let Some(selected) = caps.flag(flag) else {
                            continue;
                        };
                        if let Some(v) = variants.iter().find(|v| v.key == selected) {
                            entries.extend_from_slice(v.entries);
                        }
                    }
                }
            }

            // Prefix-only sections (temperature) carry their value inline.
            if !entries.is_empty() || section.entries.is_empty() {
                categories.insert(
                    section.category,
                    CategoryModel {
                        prefix: section.prefix,
                        entries,
                    },
                );
            }
        }

        Self { categories }
    }

    pub fn category(&self, category: Category) -> Option<&CategoryModel> {
        self.categories.get(&category)
    }

    pub fn supports(&self, category: Category) -> bool {
        self.categories.contains_key(&category)
    }

    pub fn prefix(&self, category: Category) -> Option<&'static str> {
        self.category(category).map(|c| c.prefix)
    }

    pub fn tokens(&self, category: Category) -> Vec<&'static str> {
        self.category(category)
            .map(|c| c.tokens().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> Capabilities {
        Capabilities {
            id: "1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn bare_unit_has_only_unconditional_entries() {
        let model = UnitModel::resolve(&caps());
        assert_eq!(model.tokens(Category::Power), vec!["on", "off"]);
        assert_eq!(model.tokens(Category::Mode), vec!["heat", "cool", "fan"]);
        assert!(model.supports(Category::Temperature));
        assert!(!model.supports(Category::Fan));
        assert!(!model.supports(Category::AirDirectionV));
        assert!(!model.supports(Category::AirDirectionH));
    }

    #[test]
    fn optional_modes_follow_flags() {
        let mut c = caps();
        c.hasautomode = Some(1);
        c.hasdrymode = Some(0);
        let model = UnitModel::resolve(&c);
        let modes = model.tokens(Category::Mode);
        assert!(modes.contains(&"auto"));
        assert!(!modes.contains(&"dry"));
    }

    #[test]
    fn fan_stage_three_without_auto() {
        let mut c = caps();
        c.fanstage = Some(3);
        let model = UnitModel::resolve(&c);
        let fan = model.category(Category::Fan).unwrap();
        assert_eq!(fan.prefix, "FS");
        assert_eq!(fan.tokens().collect::<Vec<_>>(), vec!["1", "2", "3"]);
        assert_eq!(fan.code("3"), Some("5"));
        assert_eq!(fan.code("auto"), None);
        assert_eq!(fan.code("speed"), None);
    }

    #[test]
    fn fan_stage_five_with_auto() {
        let mut c = caps();
        c.fanstage = Some(5);
        c.hasautofan = Some(1);
        let model = UnitModel::resolve(&c);
        assert_eq!(
            model.tokens(Category::Fan),
            vec!["auto", "1", "2", "3", "4", "5"]
        );
    }

    #[test]
    fn unknown_fan_stage_omits_speeds() {
        let mut c = caps();
        c.fanstage = Some(9);
        let model = UnitModel::resolve(&c);
        assert!(!model.supports(Category::Fan));
    }

    #[test]
    fn horizontal_level_selects_table() {
        let mut c = caps();
        c.hasairdirh = Some(1);
        let level1 = UnitModel::resolve(&c);
        assert_eq!(level1.tokens(Category::AirDirectionH).len(), 5);
        assert!(!level1.tokens(Category::AirDirectionH).contains(&"swing"));

        c.hasairdirh = Some(2);
        let level2 = UnitModel::resolve(&c);
        let tokens = level2.tokens(Category::AirDirectionH);
        assert!(tokens.contains(&"split"));
        assert!(tokens.contains(&"swing"));

        c.hasairdirh = Some(0);
        assert!(!UnitModel::resolve(&c).supports(Category::AirDirectionH));
    }

    #[test]
    fn vertical_direction_flags_are_independent() {
        let mut c = caps();
        c.hasswing = Some(1);
        let model = UnitModel::resolve(&c);
        assert_eq!(model.tokens(Category::AirDirectionV), vec!["swing"]);

        c.hasairdir = Some(1);
        c.hasairauto = Some(1);
        let model = UnitModel::resolve(&c);
        assert_eq!(
            model.tokens(Category::AirDirectionV),
            vec!["auto", "1", "2", "3", "4", "5", "swing"]
        );
    }

    #[test]
    fn resolution_is_deterministic() {
        let mut c = caps();
        c.fanstage = Some(4);
        c.hasairdirh = Some(2);
        assert_eq!(UnitModel::resolve(&c), UnitModel::resolve(&c));
    }
}
