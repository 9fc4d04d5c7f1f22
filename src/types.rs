/// Identifier of a content item (the canonical article url).
/// e.g. `http://www.nytimes.com/2011/11/02/world/europe/greece.html`
pub type ItemId = String;
/// Identifier of the user who cast a vote.
/// e.g. `14293310`
pub type AuthorId = String;
/// Identifier of the individual tweet carrying a vote.
/// e.g. `131412340117524480`
pub type TweetId = String;
/// Category label attached to an item.
/// e.g. `world`, `business`, `opinion`
pub type CategoryTag = String;
/// Name of a cohort (activity tier, expert group, bucket).
/// e.g. `newsaholics`, `experts_ci`, `even_bucket_2`
pub type CohortName = String;
/// 1-based position of an item within a ranking.
pub type Rank = usize;
