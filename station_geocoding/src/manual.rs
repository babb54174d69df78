/*!

This is the long-form manual for `station_geocoding` and `geocode-stations`.

## Input formats

The following formats are supported:
* `xlsx` Excel workbook (the first worksheet, unless `worksheetName` is set)
* `csv` Comma Separated Values with a header row

The provider is inferred from the file extension when it is not set in the
configuration.

Columns are found by their header, not by their position. The defaults
follow the list published by the National Election Commission:

| header         | content                         |
|----------------|---------------------------------|
| `사전투표소명` | name of the early-voting station |
| `투표소명`     | name of the station (fallback)  |
| `시도`         | province                        |
| `구시군명`     | city, county or district        |
| `읍면동명`     | neighborhood                    |

A row without a name is given the name `투표소_<n>`.

## Address variants

Every station is tried with up to four addresses, most specific first:

1. `시도 구시군명 읍면동명` as written in the source;
2. the same with numbered sub-districts collapsed: `청운제1동` becomes `청운동`,
   and interpuncts are removed (`종로1·2·3·4가동` becomes `종로1234가동`);
3. `시도 구시군명`;
4. `시도`.

The first variant with a search hit wins, so a specific but wrong match
beats a coarse but right one. Results matched on variants 3 and 4 are only
district or province centroids: look at `geocode_attempt` in the output
before trusting them.

## Commands

```bash
geocode-stations geocode -i list.xlsx -o out/
geocode-stations geocode -i list.xlsx -o out/section3 --start 2635 --end 3568
geocode-stations reprocess -i out/stations.json -o out/stations_reprocessed.json
geocode-stations merge -i out/section1/stations.json -i out/section2/stations.json -o stations.json
geocode-stations report -i stations.json -o stats.json
```

`geocode` writes a checkpoint every `checkpointEvery` stations under
`<out>/checkpoint/`. Running the same command again resumes from it, as long
as the input file did not change. Use `--fresh` to discard it.

## Configuration

All keys are optional.

```json
{
  "geocoder": {
    "endpoint": "https://nominatim.openstreetmap.org/search",
    "userAgent": "my-organisation-station-map/1.0",
    "countryCodes": ["kr"],
    "resultLimit": 3,
    "timeoutSecs": 10,
    "requestsPerSecond": 1.0,
    "jitterMs": 250
  },
  "input": {
    "provider": "xlsx",
    "worksheetName": "Sheet1",
    "nameColumns": ["사전투표소명", "투표소명"],
    "provinceColumn": "시도",
    "districtColumn": "구시군명",
    "neighborhoodColumn": "읍면동명"
  },
  "output": {
    "checkpointEvery": 100,
    "fallbackCoordinates": { "lat": 37.5665, "lng": 126.978 }
  }
}
```

The public Nominatim instance requires an identifying User-Agent and allows
at most one request per second. Do not raise `requestsPerSecond` unless you
run your own instance.

 */
