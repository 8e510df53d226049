use serde::{Deserialize, Serialize};

/// Ordered selector candidates for each semantic target on the ranking page.
///
/// Earlier entries are tried first. The lists are static configuration; markup
/// drift is handled by appending alternatives, not by computing selectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selectors {
    /// Product card container, one match per listed product
    pub card: Vec<String>,
    /// Product name within a card
    pub name: Vec<String>,
    /// Current (sale) price within a card
    pub price: Vec<String>,
    /// Product detail link within a card
    pub link: Vec<String>,
    /// Rank badge within a card
    #[serde(default = "default_rank")]
    pub rank: Vec<String>,
    /// Attribute preferred over rendered text for name and price
    pub text_attribute: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            card: strings(&[
                "ul.cate_prd_list li",
                ".ranking_list .prd_info",
                "ul.tab_cont_list li",
                "ul.prd_list li",
                "div.best_prd_area ul li",
                "div#Container ul li",
            ]),
            name: strings(&[
                ".tx_name",
                ".prd_name",
                ".name",
                "a .name",
                "strong",
                "a[title]",
                ".prd_info .name",
            ]),
            price: strings(&[
                ".tx_cur",
                ".cur_price",
                ".price .num",
                ".price",
                ".won",
                ".cost",
                ".prd_info .price",
            ]),
            link: strings(&["a", "a.prd_thumb", "a.prd_info", ".prd_info a"]),
            rank: default_rank(),
            text_attribute: "title".to_string(),
        }
    }
}

// `.tx_num`/`.num` also mark price digits, so they are left out
fn default_rank() -> Vec<String> {
    strings(&[".thumb_flag.best", ".best_num", ".rank", "em.num_rank", "em"])
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
