// tests/offer_crawl.rs
use spec_scraper::fixture::FixturePage;
use spec_scraper::runner::run_offers;

const PRODUCT: &str = r#"<html><body>
    <div class="scrolling_inner">
        <div class="box03 color group desk">
            <a class="box03__item" href="https://tgdd.test/iphone-den">Đen</a>
            <a class="box03__item" href="">Hết hàng</a>
            <a class="box03__item" href="https://tgdd.test/iphone-hong">Hồng</a>
        </div>
    </div>
</body></html>"#;

fn color_page(price: &str, promo: &str) -> String {
    format!(
        r#"<html><body>
            <div class="price-one">
                <p class="box-price-present">{price}</p>
                <p class="box-price-old">25.990.000₫</p>
                <p class="box-price-percent">-8%</p>
            </div>
            <div id="location-detail"><a>Hà Nội</a></div>
            <div class="block__promo">
                <p class="pr-txtb">Khuyến mãi</p>
                <div class="divb-right"><p>{promo}</p></div>
            </div>
        </body></html>"#
    )
}

#[tokio::test(start_paused = true)]
async fn reads_offer_for_each_linked_color() {
    let page = FixturePage::new(PRODUCT)
        .with_route("https://tgdd.test/iphone", PRODUCT)
        .with_route("https://tgdd.test/iphone-den", color_page("23.990.000₫", "Giảm 300.000₫"))
        .with_route("https://tgdd.test/iphone-hong", color_page("23.490.000₫", "Tặng sạc nhanh"));

    let offers = run_offers(&page, "https://tgdd.test/iphone").await.unwrap();

    assert_eq!(
        page.visited(),
        vec![
            "https://tgdd.test/iphone",
            "https://tgdd.test/iphone-den",
            "https://tgdd.test/iphone",
            "https://tgdd.test/iphone-hong"
        ]
    );
    assert_eq!(offers.len(), 3);

    assert_eq!(offers[0].color, "Đen");
    assert_eq!(offers[0].offer.current_price, "23.990.000₫");
    assert_eq!(offers[0].offer.promo_list, vec!["Giảm 300.000₫"]);

    // The empty link stays on the product page, which has no price block.
    assert_eq!(offers[1].color, "Hết hàng");
    assert_eq!(offers[1].url, "https://tgdd.test/iphone");
    assert_eq!(offers[1].offer.current_price, "");
    assert_eq!(offers[1].error, None);

    assert_eq!(offers[2].color, "Hồng");
    assert_eq!(offers[2].url, "https://tgdd.test/iphone-hong");
    assert_eq!(offers[2].offer.location, "Hà Nội");

    let json = serde_json::to_value(&offers[2]).unwrap();
    assert_eq!(json["current_price"], "23.490.000₫");
    assert_eq!(json["promo_list"][0], "Tặng sạc nhanh");
    assert!(json.get("error").is_none());
}

#[tokio::test(start_paused = true)]
async fn product_without_colors_gives_no_offers() {
    let page = FixturePage::new("<html><body><h1>iPhone</h1></body></html>");
    let offers = run_offers(&page, "https://tgdd.test/iphone").await.unwrap();
    assert!(offers.is_empty());
    assert_eq!(page.visited().len(), 1);
}
