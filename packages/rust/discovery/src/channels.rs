//! Discovery channels: one search query template per source family.

/// Placeholder replaced by the keyword in a query template.
const KEYWORD_PLACEHOLDER: &str = "{keyword}";

/// A named search query template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryChannel {
    pub name: String,
    /// Query with a `{keyword}` placeholder.
    pub query_template: String,
    pub description: Option<String>,
}

impl DiscoveryChannel {
    pub fn new(name: &str, query_template: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            query_template: query_template.to_string(),
            description: Some(description.to_string()),
        }
    }

    /// The search query for `keyword`.
    pub fn build_query(&self, keyword: &str) -> String {
        self.query_template.replace(KEYWORD_PLACEHOLDER, keyword)
    }
}

fn base_channels() -> Vec<DiscoveryChannel> {
    vec![
        DiscoveryChannel::new("general", "{keyword}", "general web search"),
        DiscoveryChannel::new("news", "{keyword} 新闻", "news coverage"),
        DiscoveryChannel::new("reviews", "{keyword} 评测", "reviews and ratings"),
    ]
}

fn consumer_channels() -> Vec<DiscoveryChannel> {
    vec![
        DiscoveryChannel::new(
            "ecommerce",
            "{keyword} 价格 OR 评测 site:jd.com OR site:taobao.com",
            "store listings and buyer reviews",
        ),
        DiscoveryChannel::new("video", "{keyword} 开箱 OR 体验 视频", "unboxing and hands-on videos"),
        DiscoveryChannel::new("community", "{keyword} 讨论 forum OR 知乎", "community discussion"),
    ]
}

fn software_channels() -> Vec<DiscoveryChannel> {
    vec![
        DiscoveryChannel::new("docs", "{keyword} documentation", "official documentation"),
        DiscoveryChannel::new("github", "{keyword} github", "source repositories"),
        DiscoveryChannel::new("issues", "{keyword} bug OR issue tracker", "issue trackers"),
    ]
}

fn b2b_channels() -> Vec<DiscoveryChannel> {
    vec![
        DiscoveryChannel::new("analyst", "{keyword} 市场报告 OR 白皮书", "analyst and market reports"),
        DiscoveryChannel::new(
            "review",
            "{keyword} 客户案例 OR 评价 site:g2.com OR site:gartner.com",
            "third-party reviews and customer cases",
        ),
        DiscoveryChannel::new("sales", "{keyword} RFP OR 招标 OR 采购", "procurement and tenders"),
        DiscoveryChannel::new("company", "{keyword} 企业官网 OR case study", "vendor sites and case studies"),
    ]
}

/// Discovery channels for a product type: the base set plus the
/// type-specific set. Unknown or missing types get the base set only.
pub fn discovery_channels_for(product_type: Option<&str>) -> Vec<DiscoveryChannel> {
    let normalized = product_type.unwrap_or_default().trim().to_lowercase();
    let extra = match normalized.as_str() {
        "consumer" => consumer_channels(),
        "software" => software_channels(),
        "b2b" => b2b_channels(),
        _ => Vec::new(),
    };

    merge_channels([base_channels(), extra])
}

/// Channel names for a product type, in query order.
pub fn list_channel_names(product_type: Option<&str>) -> Vec<String> {
    discovery_channels_for(product_type)
        .into_iter()
        .map(|c| c.name)
        .collect()
}

/// Concatenate channel groups, keeping the first channel of each name.
pub fn merge_channels<I>(groups: I) -> Vec<DiscoveryChannel>
where
    I: IntoIterator<Item = Vec<DiscoveryChannel>>,
{
    let mut merged: Vec<DiscoveryChannel> = Vec::new();
    for channel in groups.into_iter().flatten() {
        if merged.iter().any(|c| c.name == channel.name) {
            continue;
        }
        merged.push(channel);
    }
    merged
}
