#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// Fires when the message contains the text anywhere.
    Contains(&'static str),
    /// Fires only when the whole message is the text.
    Exact(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Style {
    /// Posted to the channel.
    Say,
    /// Posted as a reply mentioning the author.
    Reply,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Keyword {
    pub trigger: Trigger,
    pub text: &'static str,
    pub style: Style,
}

impl Keyword {
    pub fn matches(&self, content: &str) -> bool {
        match self.trigger {
            Trigger::Contains(pattern) => content.contains(pattern),
            Trigger::Exact(pattern) => content == pattern,
        }
    }
}

const fn say(pattern: &'static str, text: &'static str) -> Keyword {
    Keyword { trigger: Trigger::Contains(pattern), text, style: Style::Say }
}

const fn reply(trigger: Trigger, text: &'static str) -> Keyword {
    Keyword { trigger, text, style: Style::Reply }
}

pub const KEYWORDS: &[Keyword] = &[
    say("跟你說喔", "小胖胖很可愛🥰"),
    say("哼", "(把鼓起的臉頰戳下去😉"),
    say("被你氣死", "不氣不氣~ 小胖胖最好了"),
    say("滾", "滾地球一圈🌏🌍🌎🌏 我又回來了~"),
    say("臭胖", "是香胖歐😊"),
    say("死胖子", "你怎麼忍心🥺"),
    say("胖胖", "怎麼了小胖胖😀"),
    say("掰", "掰掰小胖胖👋"),
    say("拜", "掰掰小胖胖👋"),
    say("喔", "(搓臉"),
    say("憨", "肯定不是我呢😀"),
    say("靠", "Cow是牛喔~"),
    say("蛤", "蛤蚂在海裡喔，煮湯好喝😋"),
    say("我好可愛", "小胖胖最可愛了🥰"),
    say("不理我", "怎麼會不理你呢~小胖胖😉"),
    say("不理你", "不要不理我拉~小胖胖🥺"),
    say("很痛", "不痛不痛眼淚是珍珠🥺"),
    say("晚上好", "晚上好的呢~"),
    say("～～", "海帶呀海帶～海帶呀海帶～"),
    say("~~", "海帶呀海帶~海帶呀海帶~"),
    say("廁所", "小心不要掉到馬桶喔~😉"),
    say("🌚", "小胖胖太陽曬很多喔😏 要記得擦防曬~"),
    say("嗚嗚", "嗚~嗚~ 寢強寢強~"),
    say("人渣", "皮諾可，這個直接電死😡"),
    say("變態", "誰!? Who!? 蝦郎!? 😮"),
    say("欠打", "誰!? Who!? 蝦郎!? 😮 肯定不是我😉"),
    say("關麥", "沒有問題的呢~"),
    say("去樓下", "沒有問題的呢~"),
    say("洗澡", "要變香香小胖胖了😊"),
    say("吃東西", "小胖胖 看看你的肚肚😀"),
    say("等一下", "等兩下😉"),
    say("等兩下", "等三下😉"),
    reply(Trigger::Contains("嘴邊肉"), "的特好捏呢😊"),
    reply(Trigger::Exact("胖子"), "很瘦的呦~"),
    reply(Trigger::Exact("可愛"), "誰可愛呀😏~"),
];

/// Every keyword the message triggers, in table order. Keywords do not
/// shadow each other.
pub fn matching(content: &str) -> impl Iterator<Item = &'static Keyword> + '_ {
    KEYWORDS.iter().filter(move |keyword| keyword.matches(content))
}
