//! Territory registry: maps source identifiers to catalog territory labels.
//!
//! A source is identified by its English directory name (e.g. "Poland"). The
//! registry supplies the native-script territory name and, where known, the
//! language the source's listings are written in. Sub-region rules split one
//! physical source into several territories at presentation time.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Territory labels attached to every catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Territory {
    /// Native-script (Chinese) territory name, e.g. "波兰"
    pub native: String,
    /// Normalized-script territory name, e.g. "Poland"
    pub code: String,
}

impl Territory {
    pub fn new(native: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            native: native.into(),
            code: code.into(),
        }
    }
}

/// Presentation override for a sub-region stored inside a parent source.
#[derive(Debug, Clone)]
struct SubRegionRule {
    parent: &'static str,
    /// Lower-case markers matched against the store file name
    markers: &'static [&'static str],
    code: &'static str,
    native: &'static str,
}

const SUB_REGION_RULES: &[SubRegionRule] = &[
    SubRegionRule {
        parent: "China",
        markers: &["hk_universities", "hong_kong"],
        code: "Hong Kong",
        native: "中国香港",
    },
    SubRegionRule {
        parent: "China",
        markers: &["macau_universities", "macao"],
        code: "Macau",
        native: "中国澳门",
    },
    SubRegionRule {
        parent: "China",
        markers: &["taiwan"],
        code: "Taiwan",
        native: "中国台湾",
    },
];

/// Languages the raw listings of a source are usually written in.
const SOURCE_LANGUAGES: &[(&str, &str)] = &[
    ("Russia", "Russian"),
    ("France", "French"),
    ("Germany", "German"),
    ("Switzerland", "German/French/Italian"),
    ("Sweden", "Swedish"),
    ("Italy", "Italian"),
    ("Georgia", "Georgian"),
    ("Netherlands", "Dutch"),
    ("Czech Republic", "Czech"),
    ("Portugal", "Portuguese"),
    ("Mexico", "Spanish"),
    ("Spain", "Spanish"),
    ("Poland", "Polish"),
];

/// Source (English name) to native territory name.
const TERRITORIES: &[(&str, &str)] = &[
    ("China", "中国"),
    ("Japan", "日本"),
    ("Poland", "波兰"),
    ("Egypt", "埃及"),
    ("USA", "美国"),
    ("UK", "英国"),
    ("Australia", "澳大利亚"),
    ("Malaysia", "马来西亚"),
    ("India", "印度"),
    ("Singapore", "新加坡"),
    ("Qatar", "卡塔尔"),
    ("Ireland", "爱尔兰"),
    ("Philippines", "菲律宾"),
    ("Ethiopia", "埃塞俄比亚"),
    ("UAE", "阿联酋"),
    ("South Korea", "韩国"),
    ("Bangladesh", "孟加拉国"),
    ("Moldova", "摩尔多瓦"),
    ("Russia", "俄罗斯"),
    ("France", "法国"),
    ("Germany", "德国"),
    ("Afghanistan", "阿富汗"),
    ("Cambodia", "柬埔寨"),
    ("Canada", "加拿大"),
    ("Kenya", "肯尼亚"),
    ("Cameroon", "喀麦隆"),
    ("South Africa", "南非"),
    ("Switzerland", "瑞士"),
    ("Sweden", "瑞典"),
    ("Vietnam", "越南"),
    ("Italy", "意大利"),
    ("Israel", "以色列"),
    ("Fiji", "斐济"),
    ("Laos", "老挝"),
    ("Mongolia", "蒙古"),
    ("Norway", "挪威"),
    ("Sri Lanka", "斯里兰卡"),
    ("Turkey", "土耳其"),
    ("New Zealand", "新西兰"),
    ("Georgia", "格鲁吉亚"),
    ("Netherlands", "荷兰"),
    ("Czech Republic", "捷克"),
    ("Portugal", "葡萄牙"),
    ("Mexico", "墨西哥"),
    ("Spain", "西班牙"),
    ("Austria", "奥地利"),
    ("Angola", "安哥拉"),
    ("Andorra", "安道尔"),
    ("Estonia", "爱沙尼亚"),
    ("Azerbaijan", "阿塞拜疆"),
    ("Algeria", "阿尔及利亚"),
    ("Albania", "阿尔巴尼亚"),
    ("Oman", "阿曼"),
    ("Argentina", "阿根廷"),
    ("Bulgaria", "保加利亚"),
    ("Iceland", "冰岛"),
    ("North Macedonia", "北马其顿"),
    ("Botswana", "博茨瓦纳"),
    ("Palestine", "巴勒斯坦"),
    ("Pakistan", "巴基斯坦"),
    ("Barbados", "巴巴多斯"),
    ("Panama", "巴拿马"),
    ("Brazil", "巴西"),
    ("Burkina Faso", "布基纳法索"),
    ("Burundi", "布隆迪"),
    ("Belgium", "比利时"),
    ("Bosnia and Herzegovina", "波斯尼亚和黑塞哥维那"),
    ("Bolivia", "玻利维亚"),
    ("Belarus", "白俄罗斯"),
    ("Peru", "秘鲁"),
    ("Benin", "贝宁共和国"),
    ("North Korea", "朝鲜"),
    ("Denmark", "丹麦"),
    ("Togo", "多哥"),
    ("Dominican Republic", "多米尼加"),
    ("Ecuador", "厄瓜多尔"),
    ("Finland", "芬兰"),
    ("Congo (Brazzaville)", "刚果（布）"),
    ("Congo (Kinshasa)", "刚果（金）"),
    ("Cuba", "古巴"),
    ("Colombia", "哥伦比亚"),
    ("Costa Rica", "哥斯达黎加"),
    ("Grenada", "格林纳达"),
    ("Kazakhstan", "哈萨克斯坦"),
    ("Montenegro", "黑山"),
    ("Guinea", "几内亚"),
    ("Ghana", "加纳"),
    ("Kyrgyzstan", "吉尔吉斯斯坦"),
    ("Zimbabwe", "津巴布韦"),
    ("Croatia", "克罗地亚"),
    ("Kuwait", "科威特"),
    ("Ivory Coast", "科特迪瓦"),
    ("Liechtenstein", "列支敦士登"),
    ("Libya", "利比亚"),
    ("Liberia", "利比里亚"),
    ("Rwanda", "卢旺达"),
    ("Luxembourg", "卢森堡"),
    ("Latvia", "拉脱维亚"),
    ("Lithuania", "立陶宛"),
    ("Romania", "罗马尼亚"),
    ("Lebanon", "黎巴嫩"),
    ("Morocco", "摩洛哥"),
    ("Monaco", "摩纳哥"),
    ("Mauritius", "毛里求斯"),
    ("Myanmar", "缅甸"),
    ("Mozambique", "莫桑比克"),
    ("Maldives", "马尔代夫"),
    ("Malawi", "马拉维"),
    ("Malta", "马耳他"),
    ("Madagascar", "马达加斯加"),
    ("Mali", "马里共和国"),
    ("Nigeria", "尼日利亚"),
    ("Niger", "尼日尔"),
    ("Nepal", "尼泊尔"),
    ("Namibia", "纳米比亚"),
    ("Serbia", "塞尔维亚"),
    ("Sierra Leone", "塞拉利昂"),
    ("Cyprus", "塞浦路斯"),
    ("Slovakia", "斯洛伐克"),
    ("Slovenia", "斯洛文尼亚"),
    ("Saudi Arabia", "沙特阿拉伯"),
    ("Sudan", "苏丹"),
    ("Turkmenistan", "土库曼斯坦"),
    ("Tanzania", "坦桑尼亚"),
    ("Tajikistan", "塔吉克斯坦"),
    ("Thailand", "泰国"),
    ("Trinidad and Tobago", "特立尼达和多巴哥"),
    ("Tunisia", "突尼斯"),
    ("Ukraine", "乌克兰"),
    ("Uzbekistan", "乌兹别克斯坦"),
    ("Uganda", "乌干达"),
    ("Uruguay", "乌拉圭"),
    ("Guatemala", "危地马拉"),
    ("Venezuela", "委内瑞拉"),
    ("Brunei", "文莱"),
    ("Hungary", "匈牙利"),
    ("Syria", "叙利亚"),
    ("Greece", "希腊"),
    ("Yemen", "也门"),
    ("Armenia", "亚美尼亚"),
    ("Iraq", "伊拉克"),
    ("Iran", "伊朗"),
    ("Indonesia", "印度尼西亚"),
    ("Jamaica", "牙买加"),
    ("Jordan", "约旦"),
    ("Chile", "智利"),
    ("Zambia", "赞比亚"),
];

/// Lookup tables built once from the static lists above.
pub struct TerritoryRegistry {
    natives: HashMap<&'static str, &'static str>,
    languages: HashMap<&'static str, &'static str>,
}

static REGISTRY: OnceLock<TerritoryRegistry> = OnceLock::new();

impl TerritoryRegistry {
    /// Get the global registry instance.
    pub fn get() -> &'static TerritoryRegistry {
        REGISTRY.get_or_init(|| TerritoryRegistry {
            natives: TERRITORIES.iter().copied().collect(),
            languages: SOURCE_LANGUAGES.iter().copied().collect(),
        })
    }

    /// Territory for a whole source. Unknown sources use the identifier for
    /// both forms.
    pub fn territory(&self, source: &str) -> Territory {
        let native = self.natives.get(source).copied().unwrap_or(source);
        Territory::new(native, source)
    }

    /// Territory for one store file of a source, applying sub-region rules.
    pub fn territory_for_file(&self, source: &str, file_name: Option<&str>) -> Territory {
        let rule = file_name.and_then(|name| {
            let name = name.to_lowercase();
            SUB_REGION_RULES.iter().find(|rule| {
                rule.parent == source && rule.markers.iter().any(|marker| name.contains(marker))
            })
        });

        match rule {
            Some(rule) => Territory::new(rule.native, rule.code),
            None => self.territory(source),
        }
    }

    /// Language hint for the oracle, if known for this source.
    pub fn source_language(&self, source: &str) -> Option<&'static str> {
        self.languages.get(source).copied()
    }

    pub fn len(&self) -> usize {
        self.natives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.natives.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_source() {
        let territory = TerritoryRegistry::get().territory("Poland");
        assert_eq!(territory, Territory::new("波兰", "Poland"));
    }

    #[test]
    fn test_unknown_source_falls_back_to_identifier() {
        let territory = TerritoryRegistry::get().territory("Atlantis");
        assert_eq!(territory, Territory::new("Atlantis", "Atlantis"));
    }

    #[test]
    fn test_table_has_no_duplicate_sources() {
        assert_eq!(TerritoryRegistry::get().len(), TERRITORIES.len());
    }

    // ==================== Sub-Region Tests ====================

    #[test]
    fn test_china_sub_regions_by_file_name() {
        let registry = TerritoryRegistry::get();

        assert_eq!(
            registry.territory_for_file("China", Some("hk_universities.csv")),
            Territory::new("中国香港", "Hong Kong")
        );
        assert_eq!(
            registry.territory_for_file("China", Some("macau_universities.csv")),
            Territory::new("中国澳门", "Macau")
        );
        assert_eq!(
            registry.territory_for_file("China", Some("Taiwan_Universities.csv")),
            Territory::new("中国台湾", "Taiwan")
        );
        assert_eq!(
            registry.territory_for_file("China", Some("hong_kong_extra_universities.csv")),
            Territory::new("中国香港", "Hong Kong")
        );
    }

    #[test]
    fn test_mainland_file_keeps_parent_territory() {
        let territory =
            TerritoryRegistry::get().territory_for_file("China", Some("china_universities.csv"));
        assert_eq!(territory, Territory::new("中国", "China"));
    }

    #[test]
    fn test_sub_region_markers_only_apply_to_parent() {
        let territory =
            TerritoryRegistry::get().territory_for_file("Japan", Some("taiwan_universities.csv"));
        assert_eq!(territory, Territory::new("日本", "Japan"));
    }

    #[test]
    fn test_source_language() {
        let registry = TerritoryRegistry::get();
        assert_eq!(registry.source_language("Poland"), Some("Polish"));
        assert_eq!(registry.source_language("Fiji"), None);
    }
}
