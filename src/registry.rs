//! Feed registry (C7): static, code-embedded `publisherLabel → [feedURL]`
//! mapping. No runtime registration API; editable only by code change.
//! Feed list extends the original source's small SBS/JTBC/Yonhap set
//! (`news_aggregator.py::_get_rss_feeds`) with the remaining Korean majors
//! the body extractor has selector coverage for (Hani, Chosun, JoongAng,
//! KBS, MBC).

use crate::models::{FeedCatalogue, PublisherFeeds};

pub fn default_catalogue() -> FeedCatalogue {
    FeedCatalogue {
        publishers: vec![
            PublisherFeeds {
                label: "SBS".to_string(),
                feed_urls: vec!["https://news.sbs.co.kr/news/basic100.do?plink=RSSREADER".to_string()],
            },
            PublisherFeeds {
                label: "JTBC".to_string(),
                feed_urls: vec!["https://fs.jtbc.co.kr/RSS/newsflash.xml".to_string()],
            },
            PublisherFeeds {
                label: "Yonhap".to_string(),
                feed_urls: vec!["https://www.yna.co.kr/rss/news.xml".to_string()],
            },
            PublisherFeeds {
                label: "Hani".to_string(),
                feed_urls: vec!["https://www.hani.co.kr/rss/".to_string()],
            },
            PublisherFeeds {
                label: "Chosun".to_string(),
                feed_urls: vec!["https://www.chosun.com/arc/outboundfeeds/rss/".to_string()],
            },
            PublisherFeeds {
                label: "JoongAng".to_string(),
                feed_urls: vec!["https://rss.joins.com/joins_news_list.xml".to_string()],
            },
            PublisherFeeds {
                label: "KBS".to_string(),
                feed_urls: vec!["https://news.kbs.co.kr/rss/rss.do?ctcd=T0000".to_string()],
            },
            PublisherFeeds {
                label: "MBC".to_string(),
                feed_urls: vec!["https://imnews.imbc.com/rss/news/news_00.xml".to_string()],
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_stays_small_and_single_digit_publishers() {
        let catalogue = default_catalogue();
        assert!(catalogue.publishers.len() < 10);
        for p in &catalogue.publishers {
            assert!(p.feed_urls.len() <= 5);
            assert!(!p.feed_urls.is_empty());
        }
    }

    #[test]
    fn every_feed_url_is_well_formed_https() {
        let catalogue = default_catalogue();
        for p in &catalogue.publishers {
            for url in &p.feed_urls {
                assert!(url::Url::parse(url).is_ok(), "bad url for {}: {}", p.label, url);
            }
        }
    }
}
